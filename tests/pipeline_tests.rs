mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::*;
use placement_roster::config::PipelineSettings;
use placement_roster::entities::sea_orm_active_enums::{FileStatus, RegistrationMethod};
use placement_roster::repositories::{CandidateRepository, CreditSource};
use placement_roster::roster::{
    PipelineError, ReconcileScope, RejectReason, RosterPipeline, SkipReason,
};
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_two_valid_rows_are_created_with_allotment() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;

    let outcome = pipeline(&db)
        .process_file(file.uploaded_file_id)
        .await
        .unwrap();

    assert_eq!(outcome.status, FileStatus::Processed);
    assert_eq!(outcome.report.provision.created, 2);
    assert_eq!(outcome.report.provision.updated, 0);
    assert_eq!(outcome.candidates_created, 2);
    assert_eq!(outcome.issued_credentials.len(), 2);

    for email in ["asha@college.edu", "vikram@college.edu"] {
        let candidate = candidate_by_email(&db, email).await;
        assert_eq!(candidate.credits, 5);
        assert!(!candidate.password_hash.is_empty());
        assert_eq!(candidate.registration_method, RegistrationMethod::Placement);
        assert_eq!(candidate.placement_id, Some(officer.placement_officer_id));
        assert_eq!(candidate.source_file_id, Some(file.uploaded_file_id));
        assert_eq!(
            candidate.college_name.as_deref(),
            Some("Government Engineering College")
        );

        let issued = outcome
            .issued_credentials
            .iter()
            .find(|issued| issued.email == email)
            .unwrap();
        assert!(bcrypt::verify(&issued.password, &candidate.password_hash).unwrap());
    }

    let stored = file_by_id(&db, file.uploaded_file_id).await;
    assert_eq!(stored.status, FileStatus::Processed);
    assert_eq!(stored.candidates_created, 2);
    assert!(stored.processed_at.is_some());
    assert!(stored.processing_token.is_none());
    assert!(stored.structured_data.is_some());
}

#[tokio::test]
async fn test_reprocessing_is_idempotent() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;
    let pipeline = pipeline(&db);

    pipeline.process_file(file.uploaded_file_id).await.unwrap();
    let first_hash = candidate_by_email(&db, "asha@college.edu").await.password_hash;

    let second = pipeline.process_file(file.uploaded_file_id).await.unwrap();

    assert_eq!(second.report.provision.created, 0);
    assert_eq!(second.report.provision.updated, 2);
    assert!(second.report.reprocess);
    assert!(second.issued_credentials.is_empty());
    assert_eq!(second.candidates_created, 2);

    let after = candidate_by_email(&db, "asha@college.edu").await;
    assert_eq!(after.password_hash, first_hash);
    assert_eq!(after.credits, 5);
    assert_eq!(
        placement_roster::entities::candidate::Entity::find()
            .count(&db)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_invalid_email_is_rejected_and_not_counted() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let csv = "Name,Email\nAsha Rao,asha@college.edu\nBroken Row,bad@\n";
    let file = seed_approved_file(&db, officer.placement_officer_id, csv, 5).await;

    let outcome = pipeline(&db)
        .process_file(file.uploaded_file_id)
        .await
        .unwrap();

    assert_eq!(outcome.report.provision.created, 1);
    assert_eq!(outcome.report.total_rows, 2);
    assert_eq!(outcome.report.rejected, 1);
    let rejection = &outcome.report.rejections[0];
    assert_eq!(rejection.row_index, 3);
    assert!(matches!(
        &rejection.reason,
        RejectReason::InvalidEmail { value } if value == "bad@"
    ));
}

#[tokio::test]
async fn test_self_registered_candidate_is_never_touched() {
    let db = setup_db().await;
    let self_registered = seed_self_registered(&db, "vikram@college.edu", 42).await;

    let first_officer = seed_officer(&db, "tpo@gec.edu").await;
    let first = seed_approved_file(
        &db,
        first_officer.placement_officer_id,
        "Name,Email\nAsha Rao,asha@college.edu\n",
        5,
    )
    .await;
    pipeline(&db)
        .process_file(first.uploaded_file_id)
        .await
        .unwrap();

    let second_officer = seed_officer(&db, "tpo@nit.edu").await;
    let second = seed_approved_file(
        &db,
        second_officer.placement_officer_id,
        &two_student_roster(),
        8,
    )
    .await;
    let outcome = pipeline(&db)
        .process_file(second.uploaded_file_id)
        .await
        .unwrap();

    assert_eq!(outcome.report.provision.skipped, 1);
    assert_eq!(outcome.report.provision.updated, 1);
    let skipped = &outcome.report.provision.skipped_rows[0];
    assert_eq!(skipped.email, "vikram@college.edu");
    assert_eq!(skipped.reason, SkipReason::OwnedBySelfRegistration);

    let after = candidate_by_id(&db, self_registered.candidate_id).await;
    assert_eq!(after.email, "vikram@college.edu");
    assert_eq!(after.credits, 42);
    assert_eq!(after.registration_method, RegistrationMethod::SelfRegistered);
    assert_eq!(after.placement_id, None);
    assert_eq!(after.source_file_id, None);
    assert_eq!(after.password_hash, self_registered.password_hash);
    assert_eq!(after.full_name, "Self Signed");
}

#[tokio::test]
async fn test_reconcile_by_placement_restores_corrupted_credits() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;
    let pipeline = pipeline(&db);
    pipeline.process_file(file.uploaded_file_id).await.unwrap();

    let asha = candidate_by_email(&db, "asha@college.edu").await;
    force_credits(&db, asha.candidate_id, 0).await;

    let report = pipeline
        .reconcile_credits(ReconcileScope::ByPlacement(officer.placement_officer_id))
        .await
        .unwrap();

    assert_eq!(report.corrected, 1);
    assert_eq!(report.inspected, 2);
    assert_eq!(report.unresolved, 0);
    assert!(report.deferred_files.is_empty());
    assert_eq!(candidate_by_email(&db, "asha@college.edu").await.credits, 5);

    let again = pipeline
        .reconcile_credits(ReconcileScope::ByPlacement(officer.placement_officer_id))
        .await
        .unwrap();
    assert_eq!(again.corrected, 0);
}

#[tokio::test]
async fn test_reconcile_by_file_honors_row_overrides() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let csv = "Name,Email,Credits\nAsha Rao,asha@college.edu,9\nVikram Nair,vikram@college.edu,\n";
    let file = seed_approved_file(&db, officer.placement_officer_id, csv, 5).await;
    let pipeline = pipeline(&db);
    pipeline.process_file(file.uploaded_file_id).await.unwrap();

    assert_eq!(candidate_by_email(&db, "asha@college.edu").await.credits, 9);
    assert_eq!(candidate_by_email(&db, "vikram@college.edu").await.credits, 5);

    for email in ["asha@college.edu", "vikram@college.edu"] {
        let candidate = candidate_by_email(&db, email).await;
        force_credits(&db, candidate.candidate_id, 0).await;
    }

    let report = pipeline
        .reconcile_credits(ReconcileScope::ByFile(file.uploaded_file_id))
        .await
        .unwrap();

    assert_eq!(report.corrected, 2);
    assert_eq!(candidate_by_email(&db, "asha@college.edu").await.credits, 9);
    assert_eq!(candidate_by_email(&db, "vikram@college.edu").await.credits, 5);
}

#[tokio::test]
async fn test_reconcile_unknown_file_is_not_found() {
    let db = setup_db().await;
    let missing = uuid::Uuid::new_v4();

    let err = pipeline(&db)
        .reconcile_credits(ReconcileScope::ByFile(missing))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::FileNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_legacy_candidate_falls_back_to_latest_file() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &two_student_roster(), 7).await;
    let pipeline = pipeline(&db);
    pipeline.process_file(file.uploaded_file_id).await.unwrap();

    let asha = candidate_by_email(&db, "asha@college.edu").await;
    clear_source_file(&db, asha.candidate_id).await;
    force_credits(&db, asha.candidate_id, 1).await;

    let report = pipeline
        .reconcile_credits(ReconcileScope::ByFile(file.uploaded_file_id))
        .await
        .unwrap();

    assert_eq!(report.corrected, 1);
    let asha = candidate_by_email(&db, "asha@college.edu").await;
    assert_eq!(asha.credits, 7);
    assert_eq!(asha.source_file_id, None);
}

#[tokio::test]
async fn test_same_student_moves_to_latest_officer() {
    let db = setup_db().await;
    let first_officer = seed_officer(&db, "tpo@gec.edu").await;
    let second_officer = seed_officer(&db, "tpo@nit.edu").await;
    let csv = "Name,Email\nAsha Rao,asha@college.edu\n";

    let first = seed_approved_file(&db, first_officer.placement_officer_id, csv, 5).await;
    let second = seed_approved_file(&db, second_officer.placement_officer_id, csv, 11).await;
    let pipeline = pipeline(&db);

    pipeline.process_file(first.uploaded_file_id).await.unwrap();
    let outcome = pipeline.process_file(second.uploaded_file_id).await.unwrap();

    assert_eq!(outcome.report.provision.updated, 1);
    assert_eq!(outcome.report.provision.created, 0);

    let asha = candidate_by_email(&db, "asha@college.edu").await;
    assert_eq!(asha.placement_id, Some(second_officer.placement_officer_id));
    assert_eq!(asha.source_file_id, Some(second.uploaded_file_id));
    assert_eq!(asha.credits, 11);
}

#[tokio::test]
async fn test_reconcile_recounts_file_that_lost_its_students() {
    let db = setup_db().await;
    let first_officer = seed_officer(&db, "tpo@gec.edu").await;
    let second_officer = seed_officer(&db, "tpo@nit.edu").await;
    let csv = "Name,Email\nAsha Rao,asha@college.edu\n";

    let first = seed_approved_file(&db, first_officer.placement_officer_id, csv, 5).await;
    let second = seed_approved_file(&db, second_officer.placement_officer_id, csv, 11).await;
    let pipeline = pipeline(&db);

    pipeline.process_file(first.uploaded_file_id).await.unwrap();
    pipeline.process_file(second.uploaded_file_id).await.unwrap();
    assert_eq!(file_by_id(&db, first.uploaded_file_id).await.candidates_created, 1);

    let report = pipeline
        .reconcile_credits(ReconcileScope::ByFile(first.uploaded_file_id))
        .await
        .unwrap();
    assert_eq!(report.recounted_files, 1);
    assert_eq!(report.corrected, 0);
    assert_eq!(file_by_id(&db, first.uploaded_file_id).await.candidates_created, 0);

    force_credits(&db, candidate_by_email(&db, "asha@college.edu").await.candidate_id, 0).await;
    let report = pipeline
        .reconcile_credits(ReconcileScope::AllCandidates)
        .await
        .unwrap();
    assert_eq!(report.recounted_files, 2);
    assert_eq!(report.corrected, 1);

    for file in [&first, &second] {
        let stored = file_by_id(&db, file.uploaded_file_id).await;
        let actual = CandidateRepository::count_by_source_file(&db, file.uploaded_file_id)
            .await
            .unwrap();
        assert_eq!(stored.candidates_created as u64, actual);
        assert!(stored.processing_token.is_none());
    }
    assert_eq!(candidate_by_email(&db, "asha@college.edu").await.credits, 11);
}

#[tokio::test]
async fn test_credit_correction_skips_candidate_relinked_elsewhere() {
    let db = setup_db().await;
    let first_officer = seed_officer(&db, "tpo@gec.edu").await;
    let second_officer = seed_officer(&db, "tpo@nit.edu").await;
    let csv = "Name,Email\nAsha Rao,asha@college.edu\n";

    let first = seed_approved_file(&db, first_officer.placement_officer_id, csv, 5).await;
    let second = seed_approved_file(&db, second_officer.placement_officer_id, csv, 11).await;
    let pipeline = pipeline(&db);

    pipeline.process_file(first.uploaded_file_id).await.unwrap();
    let snapshot = candidate_by_email(&db, "asha@college.edu").await;
    force_credits(&db, snapshot.candidate_id, 0).await;

    // A second file claims the student after the correction read it.
    pipeline.process_file(second.uploaded_file_id).await.unwrap();

    let written = CandidateRepository::set_credits(
        &db,
        &[snapshot.candidate_id],
        5,
        CreditSource::File(first.uploaded_file_id),
    )
    .await
    .unwrap();
    assert_eq!(written, 0);

    let asha = candidate_by_id(&db, snapshot.candidate_id).await;
    assert_eq!(asha.source_file_id, Some(second.uploaded_file_id));
    assert_eq!(asha.credits, 11);

    // Rows without a source file only match under their own officer.
    clear_source_file(&db, asha.candidate_id).await;
    let written = CandidateRepository::set_credits(
        &db,
        &[asha.candidate_id],
        5,
        CreditSource::Unsourced {
            placement_id: first_officer.placement_officer_id,
        },
    )
    .await
    .unwrap();
    assert_eq!(written, 0);

    let written = CandidateRepository::set_credits(
        &db,
        &[asha.candidate_id],
        7,
        CreditSource::Unsourced {
            placement_id: second_officer.placement_officer_id,
        },
    )
    .await
    .unwrap();
    assert_eq!(written, 1);
    assert_eq!(candidate_by_id(&db, asha.candidate_id).await.credits, 7);
}

#[tokio::test]
async fn test_long_pass_keeps_its_gate() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &roster_of(6), 5).await;
    let lease = Duration::from_secs(1);
    let slow = slow_pipeline(&db, lease, Duration::from_millis(200));
    let rival = pipeline(&db);

    let (first, second) = tokio::join!(slow.process_file(file.uploaded_file_id), async {
        // Past the first lease deadline, while rows are still being hashed.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        rival.process_file(file.uploaded_file_id).await
    });

    let first = first.unwrap();
    assert_eq!(first.report.provision.created, 6);
    assert!(!first.report.reprocess);
    assert!(matches!(second, Err(PipelineError::FileBusy(id)) if id == file.uploaded_file_id));

    let stored = file_by_id(&db, file.uploaded_file_id).await;
    assert_eq!(stored.status, FileStatus::Processed);
    assert_eq!(stored.candidates_created, 6);
    assert!(stored.processing_token.is_none());
}

#[tokio::test]
async fn test_failing_hasher_leaves_file_approved() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;

    let err = failing_pipeline(&db)
        .process_file(file.uploaded_file_id)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Provision { file_id, .. } if file_id == file.uploaded_file_id));
    assert!(err.is_retryable());
    assert_eq!(err.kind(), "credential_backend_unavailable");

    let stored = file_by_id(&db, file.uploaded_file_id).await;
    assert_eq!(stored.status, FileStatus::Approved);
    assert!(stored.processed_at.is_none());
    assert!(stored.last_report.is_none());
    assert!(stored.processing_token.is_none());

    // The gate was released, so a healthy retry goes through.
    let outcome = pipeline(&db)
        .process_file(file.uploaded_file_id)
        .await
        .unwrap();
    assert_eq!(outcome.report.provision.created, 2);
}

#[tokio::test]
async fn test_decode_failure_keeps_status() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, "Name,Email\n", 5).await;

    let err = pipeline(&db)
        .process_file(file.uploaded_file_id)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "empty_file");
    assert!(!err.is_retryable());
    let stored = file_by_id(&db, file.uploaded_file_id).await;
    assert_eq!(stored.status, FileStatus::Approved);
    assert!(stored.processing_token.is_none());
}

#[tokio::test]
async fn test_pending_and_rejected_files_cannot_be_processed() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let pipeline = pipeline(&db);

    let pending = seed_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;
    let err = pipeline
        .process_file(pending.uploaded_file_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "illegal_transition");

    pipeline
        .reject(pending.uploaded_file_id, "wrong batch")
        .await
        .unwrap();
    let err = pipeline
        .process_file(pending.uploaded_file_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "illegal_transition");

    assert_eq!(
        placement_roster::entities::candidate::Entity::find()
            .count(&db)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_auto_approve_processes_pending_file() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;
    let pipeline = RosterPipeline::new(
        db.clone(),
        PipelineSettings {
            auto_approve_uploads: true,
            ..test_settings()
        },
    );

    let outcome = pipeline.process_file(file.uploaded_file_id).await.unwrap();

    assert_eq!(outcome.report.provision.created, 2);
    assert!(!outcome.report.reprocess);
    let stored = file_by_id(&db, file.uploaded_file_id).await;
    assert_eq!(stored.status, FileStatus::Processed);
    assert!(stored.approved_at.is_some());
}

#[tokio::test]
async fn test_concurrent_processing_creates_each_candidate_once() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;
    let first = pipeline(&db);
    let second = pipeline(&db);

    let (a, b) = tokio::join!(
        first.process_file(file.uploaded_file_id),
        second.process_file(file.uploaded_file_id)
    );

    let mut created = 0;
    let mut first_passes = 0;
    for result in [a, b] {
        match result {
            Ok(outcome) => {
                created += outcome.report.provision.created;
                if !outcome.report.reprocess {
                    first_passes += 1;
                }
            }
            Err(e) => assert!(matches!(e, PipelineError::FileBusy(_)), "unexpected {e}"),
        }
    }

    assert_eq!(created, 2);
    assert_eq!(first_passes, 1);

    let emails: HashSet<String> = placement_roster::entities::candidate::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.email)
        .collect();
    assert_eq!(emails.len(), 2);
    assert_eq!(file_by_id(&db, file.uploaded_file_id).await.candidates_created, 2);
}

#[tokio::test]
async fn test_supplied_password_is_hashed_not_issued() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let csv = "Name,Email,Password\nAsha Rao,asha@college.edu,Sup3rSecret!\n";
    let file = seed_approved_file(&db, officer.placement_officer_id, csv, 5).await;

    let outcome = pipeline(&db)
        .process_file(file.uploaded_file_id)
        .await
        .unwrap();

    assert!(outcome.issued_credentials.is_empty());
    let asha = candidate_by_email(&db, "asha@college.edu").await;
    assert!(bcrypt::verify("Sup3rSecret!", &asha.password_hash).unwrap());

    let stored = file_by_id(&db, file.uploaded_file_id).await;
    let structured = stored.structured_data.unwrap().to_string();
    assert!(!structured.contains("Sup3rSecret!"));
}

#[tokio::test]
async fn test_last_report_round_trips() {
    let db = setup_db().await;
    let officer = seed_officer(&db, "tpo@gec.edu").await;
    let file = seed_approved_file(&db, officer.placement_officer_id, &two_student_roster(), 5).await;
    let pipeline = pipeline(&db);

    assert_eq!(pipeline.last_report(file.uploaded_file_id).await.unwrap(), None);

    let outcome = pipeline.process_file(file.uploaded_file_id).await.unwrap();
    let stored = pipeline
        .last_report(file.uploaded_file_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stored.total_rows, outcome.report.total_rows);
    assert_eq!(stored.provision, outcome.report.provision);
}
