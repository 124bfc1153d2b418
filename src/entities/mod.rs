pub mod candidate;
pub mod placement_officer;
pub mod sea_orm_active_enums;
pub mod uploaded_file;
