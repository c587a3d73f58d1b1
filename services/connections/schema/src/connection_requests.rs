use sea_orm::entity::prelude::*;

/// Doctor-initiated proposal to connect with a patient.
///
/// The target is a registered patient (`patient_id`) or an email/phone for a
/// patient who has not registered yet. The OTP challenge is embedded; all
/// `otp_*` columns are null for `direct` requests.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "connection_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub connection_method: String,
    pub message: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub otp_attempts: i32,
    pub otp_max_attempts: i32,
    pub otp_state: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::DoctorId",
        to = "super::accounts::Column::Id"
    )]
    Doctor,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Doctor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
