// End-to-end request lifecycle over the in-memory store with real
// PDF generation and the outbox mail transport

use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use mantentask::domain::{NewMachine, NewUser};
use mantentask::notifications::{EmailMessage, EmailNotifier, OutboxTransport};
use mantentask::{
    AccessLevel, ErrorKind, MemoryTicketStore, PdfReportGenerator, ReportFields, RequestState,
    Role, TicketStore, TicketWorkflow, User,
};

struct Harness {
    root: TempDir,
    store: Arc<MemoryTicketStore>,
    workflow: TicketWorkflow,
    supervisor: User,
    engineer: User,
    machine_id: i64,
}

impl Harness {
    async fn new() -> Self {
        let root = TempDir::new().unwrap();
        let store = Arc::new(MemoryTicketStore::new());

        let branch = store.insert_branch("Sucursal Norte").await.unwrap();
        let machine = store
            .insert_machine(NewMachine {
                branch_id: branch.id,
                model: "Torno CNC TX-300".to_string(),
                brand: "Haas".to_string(),
                serial_number: Some("HAAS-77".to_string()),
                purchased_on: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                installed_on: NaiveDate::from_ymd_opt(2025, 4, 11).unwrap(),
                last_maintenance_on: None,
            })
            .await
            .unwrap();
        let supervisor = store
            .insert_user(user("agarcia", Role::Supervisor, AccessLevel::Intermediate))
            .await
            .unwrap();
        let engineer = store
            .insert_user(user("mlopez", Role::Engineer, AccessLevel::Advanced))
            .await
            .unwrap();

        let store_dyn: Arc<dyn TicketStore> = store.clone();
        let notifier = EmailNotifier::new(
            store_dyn.clone(),
            Arc::new(OutboxTransport::new(root.path().join("outbox"))),
            "noreply@mantentask.com",
        );
        let workflow = TicketWorkflow::new(
            store_dyn,
            Arc::new(notifier),
            Arc::new(PdfReportGenerator::new(root.path().join("reports"))),
        );

        Self {
            root,
            store,
            workflow,
            supervisor,
            engineer,
            machine_id: machine.id,
        }
    }

    fn outbox(&self) -> Vec<EmailMessage> {
        read_messages(&self.root.path().join("outbox"))
    }
}

fn user(username: &str, role: Role, access_level: AccessLevel) -> NewUser {
    NewUser {
        username: username.to_string(),
        first_name: username.to_string(),
        paternal_surname: "García".to_string(),
        maternal_surname: "Torres".to_string(),
        email: format!("{username}@mantentask.com"),
        phone: None,
        branch_id: None,
        role,
        access_level,
    }
}

fn read_messages(dir: &Path) -> Vec<EmailMessage> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries.map(|entry| entry.unwrap().path()).collect();
    paths.sort();
    paths
        .into_iter()
        .map(|path| serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn request_goes_from_creation_to_emailed_report() {
    let h = Harness::new().await;

    let request = h
        .workflow
        .create_request(&h.supervisor, h.machine_id, "El torno muestra errores en el control numérico", None)
        .await
        .unwrap();
    assert_eq!(request.state, RequestState::Pending);

    let messages = h.outbox();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].to, vec!["mlopez@mantentask.com".to_string()]);

    h.workflow
        .assign_engineer(request.id, &h.supervisor, h.engineer.id)
        .await
        .unwrap();
    h.workflow
        .change_state(request.id, &h.engineer, 2)
        .await
        .unwrap();
    let done = h
        .workflow
        .change_state(request.id, &h.engineer, 3)
        .await
        .unwrap();
    assert_eq!(done.state, RequestState::Completed);

    let err = h
        .workflow
        .change_state(request.id, &h.engineer, 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalRegression);

    // Creator hears about both transitions
    let messages = h.outbox();
    let to_creator = messages
        .iter()
        .filter(|message| message.to == vec!["agarcia@mantentask.com".to_string()])
        .count();
    assert_eq!(to_creator, 2);

    let report = h
        .workflow
        .create_report(
            request.id,
            &h.engineer,
            ReportFields {
                description: "Se actualizó el firmware del controlador".to_string(),
                work_performed: Some("Calibración de ejes X, Y, Z".to_string()),
                parts_replaced: Some("Cable de pantalla".to_string()),
                recommendations: None,
            },
        )
        .await
        .unwrap();
    let document = report.document.clone().expect("document generated");
    let bytes = std::fs::read(&document.location).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
    assert!(Path::new(&document.location)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with(&format!("report_request_{}_", request.id)));

    h.workflow
        .email_report(request.id, &h.supervisor, "cliente@empresa.mx")
        .await
        .unwrap();
    let messages = h.outbox();
    let report_mail = messages
        .iter()
        .find(|message| message.to == vec!["cliente@empresa.mx".to_string()])
        .expect("report email queued");
    assert_eq!(report_mail.attachments, vec![document.location.clone()]);

    let err = h
        .workflow
        .create_report(request.id, &h.engineer, ReportFields {
            description: "Duplicado".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn supervisor_cannot_assign_inactive_engineer() {
    let h = Harness::new().await;
    let request = h
        .workflow
        .create_request(&h.supervisor, h.machine_id, "Revisión general", None)
        .await
        .unwrap();

    let mut retired = h.engineer.clone();
    retired.active = false;
    h.store.save_user(&retired).await.unwrap();

    let err = h
        .workflow
        .assign_engineer(request.id, &h.supervisor, retired.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let stored = h.store.get_request(request.id).await.unwrap();
    assert_eq!(stored.assigned_engineer, None);
    assert!(stored.updated_at <= Utc::now());
}

#[test]
fn concurrent_transitions_on_one_snapshot_admit_one_writer() {
    tokio_test::block_on(async {
        let h = Harness::new().await;
        let request = h
            .workflow
            .create_request(&h.supervisor, h.machine_id, "Vibración excesiva", None)
            .await
            .unwrap();

        let snapshot = h.store.get_request(request.id).await.unwrap();
        let mut first = snapshot.clone();
        first.state = RequestState::InProgress;
        let mut second = snapshot;
        second.state = RequestState::Completed;

        let (a, b) = tokio::join!(h.store.save_request(&first), h.store.save_request(&second));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

        let stored = h.store.get_request(request.id).await.unwrap();
        assert_eq!(stored.version, 1);
    });
}
