// In-process ticket store used by tests and dry runs

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{
    Entity, MachineFilter, ReportFilter, RequestFilter, StoreError, StoreStatistics, TicketStore,
    UserFilter,
};
use crate::domain::{
    Branch, BranchId, DocumentHandle, Machine, MachineId, NewMachine, NewRequest, NewUser, Report,
    Request, RequestId, RequestState, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    branches: BTreeMap<BranchId, Branch>,
    users: BTreeMap<UserId, User>,
    machines: BTreeMap<MachineId, Machine>,
    requests: BTreeMap<RequestId, Request>,
    reports: BTreeMap<RequestId, Report>,
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Ticket store backed by in-memory maps behind a single async lock.
///
/// Every method takes the lock once, so each read-check-write runs atomically
/// with respect to other callers, mirroring the row-level guarantees of the
/// SQLite store.
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    tables: RwLock<Tables>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a request exactly as given, bypassing version checks.
    /// Stands in for direct administrative data edits.
    pub async fn put_request(&self, request: Request) {
        self.tables.write().await.requests.insert(request.id, request);
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn get_request(&self, id: RequestId) -> Result<Request, StoreError> {
        self.tables
            .read()
            .await
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Request, id))
    }

    async fn insert_request(&self, request: NewRequest) -> Result<Request, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.machines.contains_key(&request.machine_id) {
            return Err(StoreError::not_found(Entity::Machine, request.machine_id));
        }
        if !tables.users.contains_key(&request.created_by) {
            return Err(StoreError::not_found(Entity::User, request.created_by));
        }

        let id = tables.allocate_id();
        let stored = Request {
            id,
            machine_id: request.machine_id,
            created_by: request.created_by,
            description: request.description,
            scheduled_for: request.scheduled_for,
            state: RequestState::Pending,
            assigned_engineer: None,
            created_at: request.created_at,
            updated_at: request.created_at,
            version: 0,
        };
        tables.requests.insert(id, stored.clone());
        Ok(stored)
    }

    async fn save_request(&self, request: &Request) -> Result<Request, StoreError> {
        let mut tables = self.tables.write().await;
        let current = tables
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| StoreError::not_found(Entity::Request, request.id))?;

        if current.version != request.version {
            return Err(StoreError::VersionConflict {
                request_id: request.id,
                expected: request.version,
            });
        }

        let mut saved = request.clone();
        saved.version += 1;
        *current = saved.clone();
        Ok(saved)
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        let tables = self.tables.read().await;
        let mut requests: Vec<Request> = tables
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::User, id))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .users
            .values()
            .find(|u| u.email == user.email || u.username == user.username)
        {
            return Err(StoreError::Duplicate {
                entity: Entity::User,
                id: existing.id,
            });
        }

        let id = tables.allocate_id();
        let stored = User {
            id,
            username: user.username,
            first_name: user.first_name,
            paternal_surname: user.paternal_surname,
            maternal_surname: user.maternal_surname,
            email: user.email,
            phone: user.phone,
            branch_id: user.branch_id,
            role: user.role,
            access_level: user.access_level,
            active: true,
            joined_at: Utc::now(),
        };
        tables.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::not_found(Entity::User, user.id))?;
        *slot = user.clone();
        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|user| filter.matches(user))
            .cloned()
            .collect())
    }

    async fn get_branch(&self, id: BranchId) -> Result<Branch, StoreError> {
        self.tables
            .read()
            .await
            .branches
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Branch, id))
    }

    async fn insert_branch(&self, name: &str) -> Result<Branch, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate_id();
        let branch = Branch {
            id,
            name: name.to_string(),
        };
        tables.branches.insert(id, branch.clone());
        Ok(branch)
    }

    async fn get_machine(&self, id: MachineId) -> Result<Machine, StoreError> {
        self.tables
            .read()
            .await
            .machines
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Machine, id))
    }

    async fn insert_machine(&self, machine: NewMachine) -> Result<Machine, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.branches.contains_key(&machine.branch_id) {
            return Err(StoreError::not_found(Entity::Branch, machine.branch_id));
        }

        let id = tables.allocate_id();
        let stored = Machine {
            id,
            branch_id: machine.branch_id,
            model: machine.model,
            brand: machine.brand,
            serial_number: machine.serial_number,
            purchased_on: machine.purchased_on,
            installed_on: machine.installed_on,
            last_maintenance_on: machine.last_maintenance_on,
        };
        tables.machines.insert(id, stored.clone());
        Ok(stored)
    }

    async fn save_machine(&self, machine: &Machine) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .machines
            .get_mut(&machine.id)
            .ok_or_else(|| StoreError::not_found(Entity::Machine, machine.id))?;
        *slot = machine.clone();
        Ok(())
    }

    async fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .machines
            .values()
            .filter(|machine| filter.matches(machine))
            .cloned()
            .collect())
    }

    async fn save_report(&self, report: &Report) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.requests.contains_key(&report.request_id) {
            return Err(StoreError::not_found(Entity::Request, report.request_id));
        }
        if tables.reports.contains_key(&report.request_id) {
            return Err(StoreError::Duplicate {
                entity: Entity::Report,
                id: report.request_id,
            });
        }
        tables.reports.insert(report.request_id, report.clone());
        Ok(())
    }

    async fn get_report(&self, request_id: RequestId) -> Result<Report, StoreError> {
        self.tables
            .read()
            .await
            .reports
            .get(&request_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Report, request_id))
    }

    async fn report_exists_for(&self, request_id: RequestId) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.reports.contains_key(&request_id))
    }

    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>, StoreError> {
        let tables = self.tables.read().await;
        let mut reports: Vec<Report> = tables
            .reports
            .values()
            .filter(|report| filter.matches(report))
            .cloned()
            .collect();
        reports.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.request_id.cmp(&a.request_id))
        });
        Ok(reports)
    }

    async fn attach_document(
        &self,
        request_id: RequestId,
        document: &DocumentHandle,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let report = tables
            .reports
            .get_mut(&request_id)
            .ok_or_else(|| StoreError::not_found(Entity::Report, request_id))?;
        report.document = Some(document.clone());
        Ok(())
    }

    async fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        let tables = self.tables.read().await;
        let count_state = |state: RequestState| {
            tables
                .requests
                .values()
                .filter(|request| request.state == state)
                .count() as u64
        };

        Ok(StoreStatistics {
            users: tables.users.len() as u64,
            requests: tables.requests.len() as u64,
            machines: tables.machines.len() as u64,
            branches: tables.branches.len() as u64,
            pending_requests: count_state(RequestState::Pending),
            in_progress_requests: count_state(RequestState::InProgress),
            completed_requests: count_state(RequestState::Completed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccessLevel, Role};
    use chrono::NaiveDate;

    async fn seeded() -> (MemoryTicketStore, Request) {
        let store = MemoryTicketStore::new();
        let branch = store.insert_branch("Sucursal Centro").await.unwrap();
        let machine = store
            .insert_machine(NewMachine {
                branch_id: branch.id,
                model: "Compresor Pro 5000".to_string(),
                brand: "Atlas Copco".to_string(),
                serial_number: None,
                purchased_on: NaiveDate::from_ymd_opt(2023, 1, 10).unwrap(),
                installed_on: NaiveDate::from_ymd_opt(2023, 1, 20).unwrap(),
                last_maintenance_on: None,
            })
            .await
            .unwrap();
        let user = store
            .insert_user(NewUser {
                username: "crodriguez".to_string(),
                first_name: "Carlos".to_string(),
                paternal_surname: "Rodríguez".to_string(),
                maternal_surname: "Martínez".to_string(),
                email: "carlos.rodriguez@example.com".to_string(),
                phone: None,
                branch_id: Some(branch.id),
                role: Role::Supervisor,
                access_level: AccessLevel::Intermediate,
            })
            .await
            .unwrap();
        let request = store
            .insert_request(NewRequest {
                machine_id: machine.id,
                created_by: user.id,
                description: "Pressure drops after startup".to_string(),
                scheduled_for: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        (store, request)
    }

    #[tokio::test]
    async fn new_requests_start_pending_at_version_zero() {
        let (_store, request) = seeded().await;
        assert_eq!(request.state, RequestState::Pending);
        assert_eq!(request.version, 0);
        assert_eq!(request.assigned_engineer, None);
    }

    #[tokio::test]
    async fn stale_save_is_rejected() {
        let (store, request) = seeded().await;

        let mut first = request.clone();
        first.state = RequestState::InProgress;
        let saved = store.save_request(&first).await.unwrap();
        assert_eq!(saved.version, 1);

        let mut stale = request.clone();
        stale.state = RequestState::Completed;
        let err = store.save_request(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 0, .. }));

        let stored = store.get_request(request.id).await.unwrap();
        assert_eq!(stored.state, RequestState::InProgress);
    }

    #[tokio::test]
    async fn second_report_is_a_duplicate() {
        let (store, request) = seeded().await;
        let report = Report {
            request_id: request.id,
            machine_id: request.machine_id,
            author_id: request.created_by,
            fields: crate::domain::ReportFields {
                description: "Replaced seal".to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
            document: None,
        };

        store.save_report(&report).await.unwrap();
        assert!(store.report_exists_for(request.id).await.unwrap());
        let err = store.save_report(&report).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate {
                entity: Entity::Report,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn statistics_count_by_state() {
        let (store, _request) = seeded().await;
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.completed_requests, 0);
        assert_eq!(stats.machines, 1);
        assert_eq!(stats.branches, 1);
        assert_eq!(stats.users, 1);
    }

    #[tokio::test]
    async fn machines_filter_by_branch_brand_and_search() {
        let (store, request) = seeded().await;
        let compressor = store.get_machine(request.machine_id).await.unwrap();
        let norte = store.insert_branch("Sucursal Norte").await.unwrap();
        let lathe = store
            .insert_machine(NewMachine {
                branch_id: norte.id,
                model: "Torno CNC TX-300".to_string(),
                brand: "Haas".to_string(),
                serial_number: None,
                purchased_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                installed_on: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
                last_maintenance_on: None,
            })
            .await
            .unwrap();

        let all = store.list_machines(&MachineFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let by_branch = MachineFilter {
            branch_id: Some(norte.id),
            ..Default::default()
        };
        assert_eq!(store.list_machines(&by_branch).await.unwrap(), vec![lathe.clone()]);

        let by_brand = MachineFilter {
            brand: Some("atlas copco".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list_machines(&by_brand).await.unwrap(), vec![compressor]);

        let by_search = MachineFilter {
            search: Some("cnc".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list_machines(&by_search).await.unwrap(), vec![lathe]);
    }

    #[tokio::test]
    async fn reports_filter_by_machine_and_author() {
        let (store, request) = seeded().await;
        let report = Report {
            request_id: request.id,
            machine_id: request.machine_id,
            author_id: request.created_by,
            fields: crate::domain::ReportFields {
                description: "Replaced valve".to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
            document: None,
        };
        store.save_report(&report).await.unwrap();

        let mine = ReportFilter {
            author_id: Some(request.created_by),
            ..Default::default()
        };
        assert_eq!(store.list_reports(&mine).await.unwrap(), vec![report]);

        let elsewhere = ReportFilter {
            machine_id: Some(request.machine_id + 100),
            ..Default::default()
        };
        assert!(store.list_reports(&elsewhere).await.unwrap().is_empty());
    }
}
