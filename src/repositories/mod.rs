pub mod candidate_repository;
pub mod placement_officer_repository;
pub mod uploaded_file_repository;

pub use candidate_repository::{
    CandidateRepository, CreditSource, NewPlacementCandidate, PlacementLink,
};
pub use placement_officer_repository::PlacementOfficerRepository;
pub use uploaded_file_repository::{NewUploadedFile, ProcessedBookkeeping, UploadedFileRepository};
