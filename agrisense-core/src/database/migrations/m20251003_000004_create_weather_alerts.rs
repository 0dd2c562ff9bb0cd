use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WeatherData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WeatherData::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WeatherData::UserId).integer().not_null())
                    .col(ColumnDef::new(WeatherData::Latitude).double().not_null())
                    .col(ColumnDef::new(WeatherData::Longitude).double().not_null())
                    .col(ColumnDef::new(WeatherData::Temperature).double().not_null())
                    .col(ColumnDef::new(WeatherData::Humidity).double().not_null())
                    .col(ColumnDef::new(WeatherData::Rainfall).double().not_null())
                    .col(
                        ColumnDef::new(WeatherData::WeatherDescription)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WeatherData::FetchedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weather_data_user_id")
                            .from(WeatherData::Table, WeatherData::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WeatherAlerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WeatherAlerts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WeatherAlerts::UserId).integer().not_null())
                    .col(ColumnDef::new(WeatherAlerts::WeatherDataId).integer())
                    .col(ColumnDef::new(WeatherAlerts::DiseaseName).string().not_null())
                    .col(ColumnDef::new(WeatherAlerts::CropName).string().not_null())
                    .col(ColumnDef::new(WeatherAlerts::AlertMessage).text().not_null())
                    .col(
                        ColumnDef::new(WeatherAlerts::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WeatherAlerts::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weather_alerts_user_id")
                            .from(WeatherAlerts::Table, WeatherAlerts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weather_alerts_weather_data_id")
                            .from(WeatherAlerts::Table, WeatherAlerts::WeatherDataId)
                            .to(WeatherData::Table, WeatherData::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_weather_alerts_user_read")
                    .table(WeatherAlerts::Table)
                    .col(WeatherAlerts::UserId)
                    .col(WeatherAlerts::IsRead)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WeatherAlerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WeatherData::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum WeatherData {
    Table,
    Id,
    UserId,
    Latitude,
    Longitude,
    Temperature,
    Humidity,
    Rainfall,
    WeatherDescription,
    FetchedAt,
}

#[derive(Iden)]
enum WeatherAlerts {
    Table,
    Id,
    UserId,
    WeatherDataId,
    DiseaseName,
    CropName,
    AlertMessage,
    IsRead,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
