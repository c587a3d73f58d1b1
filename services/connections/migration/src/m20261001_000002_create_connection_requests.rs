use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConnectionRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConnectionRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConnectionRequests::DoctorId).uuid().not_null())
                    .col(ColumnDef::new(ConnectionRequests::PatientId).uuid())
                    .col(ColumnDef::new(ConnectionRequests::PatientEmail).string())
                    .col(ColumnDef::new(ConnectionRequests::PatientPhone).string_len(32))
                    .col(
                        ColumnDef::new(ConnectionRequests::ConnectionMethod)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ConnectionRequests::Message).text())
                    .col(
                        ColumnDef::new(ConnectionRequests::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ConnectionRequests::Reason).text())
                    .col(ColumnDef::new(ConnectionRequests::OtpCode).string_len(6))
                    .col(
                        ColumnDef::new(ConnectionRequests::OtpExpiresAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(ConnectionRequests::OtpAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ConnectionRequests::OtpMaxAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ConnectionRequests::OtpState).string_len(16))
                    .col(
                        ColumnDef::new(ConnectionRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConnectionRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ConnectionRequests::Table, ConnectionRequests::DoctorId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ConnectionRequests::Table)
                    .col(ConnectionRequests::DoctorId)
                    .col(ConnectionRequests::Status)
                    .name("idx_connection_requests_doctor_id_status")
                    .to_owned(),
            )
            .await?;

        // Serves the expiry sweep.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_connection_requests_pending_otp_expiry \
                 ON connection_requests (otp_expires_at) WHERE status = 'pending'",
            )
            .await?;

        // Backstop for supersession: one pending request per registered pair.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_connection_requests_one_pending_per_pair \
                 ON connection_requests (doctor_id, patient_id) \
                 WHERE status = 'pending' AND patient_id IS NOT NULL",
            )
            .await
            .map(|_| ())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConnectionRequests::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ConnectionRequests {
    Table,
    Id,
    DoctorId,
    PatientId,
    PatientEmail,
    PatientPhone,
    ConnectionMethod,
    Message,
    Status,
    Reason,
    OtpCode,
    OtpExpiresAt,
    OtpAttempts,
    OtpMaxAttempts,
    OtpState,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
}
