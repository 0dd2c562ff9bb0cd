use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChatSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChatSessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChatSessions::UserId).integer().not_null())
                    .col(ColumnDef::new(ChatSessions::Crop).string().not_null())
                    .col(ColumnDef::new(ChatSessions::Title).string().not_null())
                    .col(
                        ColumnDef::new(ChatSessions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ChatSessions::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(ChatSessions::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_sessions_user_id")
                            .from(ChatSessions::Table, ChatSessions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chat_sessions_user")
                    .table(ChatSessions::Table)
                    .col(ChatSessions::UserId)
                    .col(ChatSessions::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChatMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChatMessages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChatMessages::SessionId).integer().not_null())
                    .col(ColumnDef::new(ChatMessages::Text).text().not_null())
                    .col(ColumnDef::new(ChatMessages::IsUser).boolean().not_null())
                    .col(ColumnDef::new(ChatMessages::MetadataJson).text())
                    .col(ColumnDef::new(ChatMessages::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_messages_session_id")
                            .from(ChatMessages::Table, ChatMessages::SessionId)
                            .to(ChatSessions::Table, ChatSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChatMessages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChatSessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ChatSessions {
    Table,
    Id,
    UserId,
    Crop,
    Title,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ChatMessages {
    Table,
    Id,
    SessionId,
    Text,
    IsUser,
    MetadataJson,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
