use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CropRecommendations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CropRecommendations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CropRecommendations::UserId).integer())
                    .col(ColumnDef::new(CropRecommendations::NContent).double().not_null())
                    .col(ColumnDef::new(CropRecommendations::PContent).double().not_null())
                    .col(ColumnDef::new(CropRecommendations::KContent).double().not_null())
                    .col(ColumnDef::new(CropRecommendations::Ph).double().not_null())
                    .col(
                        ColumnDef::new(CropRecommendations::Temperature)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CropRecommendations::Humidity).double().not_null())
                    .col(ColumnDef::new(CropRecommendations::Rainfall).double().not_null())
                    .col(ColumnDef::new(CropRecommendations::Latitude).double())
                    .col(ColumnDef::new(CropRecommendations::Longitude).double())
                    .col(
                        ColumnDef::new(CropRecommendations::PredictedCrop)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CropRecommendations::ConfidenceScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CropRecommendations::AlternativeCropsJson)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(CropRecommendations::ModelVersion)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CropRecommendations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_crop_recommendations_user_id")
                            .from(CropRecommendations::Table, CropRecommendations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ModelPerformance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModelPerformance::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ModelPerformance::ModelName).string().not_null())
                    .col(ColumnDef::new(ModelPerformance::Version).string().not_null())
                    .col(ColumnDef::new(ModelPerformance::Accuracy).double().not_null())
                    .col(ColumnDef::new(ModelPerformance::Precision).double().not_null())
                    .col(ColumnDef::new(ModelPerformance::Recall).double().not_null())
                    .col(ColumnDef::new(ModelPerformance::F1Score).double().not_null())
                    .col(ColumnDef::new(ModelPerformance::TestSamples).integer().not_null())
                    .col(
                        ColumnDef::new(ModelPerformance::TrainingDate)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModelPerformance::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CropRecommendations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CropRecommendations {
    Table,
    Id,
    UserId,
    NContent,
    PContent,
    KContent,
    Ph,
    Temperature,
    Humidity,
    Rainfall,
    Latitude,
    Longitude,
    PredictedCrop,
    ConfidenceScore,
    AlternativeCropsJson,
    ModelVersion,
    CreatedAt,
}

#[derive(Iden)]
enum ModelPerformance {
    Table,
    Id,
    ModelName,
    Version,
    Accuracy,
    Precision,
    Recall,
    F1Score,
    TestSamples,
    TrainingDate,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
