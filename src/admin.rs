// Administrator-only operations: dashboard and user management

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::domain::{AccessLevel, Request, Role, User, UserId};
use crate::store::{RequestFilter, StoreStatistics, TicketStore, UserFilter};
use crate::workflows::{decide, Action, Decision, WorkflowError};

pub struct AdminService {
    store: Arc<dyn TicketStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    fn require(&self, actor: &User, action: Action) -> Result<(), WorkflowError> {
        match decide(actor, action) {
            Decision::Allow => Ok(()),
            _ => Err(WorkflowError::Forbidden {
                actor_id: actor.id,
                action,
            }),
        }
    }

    /// Unassign `user` from open requests once they can no longer hold an
    /// assignment. Completed requests keep the engineer who closed them.
    async fn release_assignments(&self, user: &User) -> Result<usize, WorkflowError> {
        if user.is_assignable_engineer() {
            return Ok(0);
        }

        let filter = RequestFilter {
            assigned_engineer: Some(user.id),
            ..RequestFilter::open()
        };
        let requests = self.store.list_requests(&filter).await?;
        let released = requests.len();
        for mut request in requests {
            request.assigned_engineer = None;
            request.updated_at = Utc::now();
            self.store.save_request(&request).await?;
            info!(request_id = request.id, user_id = user.id, "Assignment released");
        }
        Ok(released)
    }

    /// Record totals and per-state request counts
    pub async fn dashboard(&self, actor: &User) -> Result<StoreStatistics, WorkflowError> {
        self.require(actor, Action::ViewDashboard)?;
        Ok(self.store.statistics().await?)
    }

    /// Every user, active or not
    pub async fn users(&self, actor: &User) -> Result<Vec<User>, WorkflowError> {
        self.require(actor, Action::ViewDashboard)?;
        Ok(self.store.list_users(&UserFilter::default()).await?)
    }

    /// Every request, newest first
    pub async fn requests(&self, actor: &User) -> Result<Vec<Request>, WorkflowError> {
        self.require(actor, Action::ViewDashboard)?;
        Ok(self.store.list_requests(&RequestFilter::default()).await?)
    }

    pub async fn set_access_level(
        &self,
        actor: &User,
        user_id: UserId,
        code: i64,
    ) -> Result<User, WorkflowError> {
        self.require(actor, Action::ManageUsers)?;
        let level = AccessLevel::from_code(code).ok_or_else(|| {
            WorkflowError::invalid_input("access level", format!("{code} is not between 1 and 4"))
        })?;

        let mut user = self.store.get_user(user_id).await?;
        user.access_level = level;
        self.store.save_user(&user).await?;
        info!(user_id, actor_id = actor.id, %level, "Access level changed");
        Ok(user)
    }

    /// Change the user's role. Leaving the engineer role unassigns open requests.
    pub async fn set_role(
        &self,
        actor: &User,
        user_id: UserId,
        code: i64,
    ) -> Result<User, WorkflowError> {
        self.require(actor, Action::ManageUsers)?;
        let role = Role::from_code(code).ok_or_else(|| {
            WorkflowError::invalid_input("role", format!("{code} is not 1 (engineer) or 2 (supervisor)"))
        })?;

        let mut user = self.store.get_user(user_id).await?;
        user.role = role;
        self.store.save_user(&user).await?;
        let released = self.release_assignments(&user).await?;
        info!(user_id, actor_id = actor.id, %role, released, "Role changed");
        Ok(user)
    }

    /// Flip the active flag and return the new value.
    ///
    /// Deactivating an engineer unassigns them from their open requests.
    pub async fn toggle_active(&self, actor: &User, user_id: UserId) -> Result<bool, WorkflowError> {
        self.require(actor, Action::ManageUsers)?;

        let mut user = self.store.get_user(user_id).await?;
        user.active = !user.active;
        self.store.save_user(&user).await?;
        let released = self.release_assignments(&user).await?;
        info!(
            user_id,
            actor_id = actor.id,
            active = user.active,
            released,
            "User active flag toggled"
        );
        Ok(user.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewMachine, NewRequest, NewUser, RequestState};
    use crate::store::MemoryTicketStore;
    use chrono::NaiveDate;
    use crate::workflows::ErrorKind;

    fn new_user(username: &str, role: Role, access_level: AccessLevel) -> NewUser {
        NewUser {
            username: username.to_string(),
            first_name: username.to_string(),
            paternal_surname: "Sistema".to_string(),
            maternal_surname: "MantenTask".to_string(),
            email: format!("{username}@mantentask.com"),
            phone: None,
            branch_id: None,
            role,
            access_level,
        }
    }

    async fn setup() -> (AdminService, Arc<MemoryTicketStore>, User, User) {
        let store = Arc::new(MemoryTicketStore::new());
        let admin = store
            .insert_user(new_user("admin", Role::Engineer, AccessLevel::Administrator))
            .await
            .unwrap();
        let supervisor = store
            .insert_user(new_user("crodriguez", Role::Supervisor, AccessLevel::Intermediate))
            .await
            .unwrap();
        (AdminService::new(store.clone()), store, admin, supervisor)
    }

    #[tokio::test]
    async fn non_admins_are_forbidden() {
        let (admin_service, _, _, supervisor) = setup().await;

        let err = admin_service.dashboard(&supervisor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = admin_service
            .toggle_active(&supervisor, supervisor.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn dashboard_counts_records() {
        let (admin_service, _, admin, _) = setup().await;
        let stats = admin_service.dashboard(&admin).await.unwrap();
        assert_eq!(stats.users, 2);
        assert_eq!(stats.requests, 0);
        assert_eq!(admin_service.users(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn codes_outside_catalog_are_invalid_input() {
        let (admin_service, _, admin, supervisor) = setup().await;

        let err = admin_service
            .set_access_level(&admin, supervisor.id, 5)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = admin_service
            .set_role(&admin, supervisor.id, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn promotion_and_role_change_persist() {
        let (admin_service, store, admin, supervisor) = setup().await;

        let promoted = admin_service
            .set_access_level(&admin, supervisor.id, 4)
            .await
            .unwrap();
        assert!(promoted.is_admin());

        admin_service.set_role(&admin, supervisor.id, 1).await.unwrap();
        let stored = store.get_user(supervisor.id).await.unwrap();
        assert_eq!(stored.role, Role::Engineer);
        assert_eq!(stored.access_level, AccessLevel::Administrator);
    }

    #[tokio::test]
    async fn toggling_flips_active_flag() {
        let (admin_service, store, admin, supervisor) = setup().await;

        assert!(!admin_service.toggle_active(&admin, supervisor.id).await.unwrap());
        assert!(!store.get_user(supervisor.id).await.unwrap().active);
        assert!(admin_service.toggle_active(&admin, supervisor.id).await.unwrap());

        let err = admin_service.toggle_active(&admin, 9_999).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    /// Engineer with one pending and one completed request assigned
    async fn assigned_engineer(store: &MemoryTicketStore, creator: &User) -> (User, Request, Request) {
        let branch = store.insert_branch("Sucursal Sur").await.unwrap();
        let machine = store
            .insert_machine(NewMachine {
                branch_id: branch.id,
                model: "Prensa Hidráulica PH-100".to_string(),
                brand: "Schuler".to_string(),
                serial_number: None,
                purchased_on: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                installed_on: NaiveDate::from_ymd_opt(2024, 2, 8).unwrap(),
                last_maintenance_on: None,
            })
            .await
            .unwrap();
        let engineer = store
            .insert_user(new_user("jperez", Role::Engineer, AccessLevel::Advanced))
            .await
            .unwrap();

        let mut requests = Vec::new();
        for state in [RequestState::Pending, RequestState::Completed] {
            let mut request = store
                .insert_request(NewRequest {
                    machine_id: machine.id,
                    created_by: creator.id,
                    description: "Fuga de aceite hidráulico".to_string(),
                    scheduled_for: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
            request.state = state;
            request.assigned_engineer = Some(engineer.id);
            requests.push(store.save_request(&request).await.unwrap());
        }
        let completed = requests.pop().unwrap();
        let pending = requests.pop().unwrap();
        (engineer, pending, completed)
    }

    #[tokio::test]
    async fn deactivating_engineer_releases_open_assignments() {
        let (admin_service, store, admin, supervisor) = setup().await;
        let (engineer, pending, completed) = assigned_engineer(&store, &supervisor).await;

        assert!(!admin_service.toggle_active(&admin, engineer.id).await.unwrap());

        let pending = store.get_request(pending.id).await.unwrap();
        assert_eq!(pending.assigned_engineer, None);
        assert_eq!(pending.state, RequestState::Pending);
        let completed = store.get_request(completed.id).await.unwrap();
        assert_eq!(completed.assigned_engineer, Some(engineer.id));

        // Reactivation does not restore the assignment
        assert!(admin_service.toggle_active(&admin, engineer.id).await.unwrap());
        assert_eq!(store.get_request(pending.id).await.unwrap().assigned_engineer, None);
    }

    #[tokio::test]
    async fn demoting_engineer_releases_open_assignments() {
        let (admin_service, store, admin, supervisor) = setup().await;
        let (engineer, pending, _) = assigned_engineer(&store, &supervisor).await;

        admin_service.set_access_level(&admin, engineer.id, 1).await.unwrap();
        assert_eq!(
            store.get_request(pending.id).await.unwrap().assigned_engineer,
            Some(engineer.id)
        );

        let demoted = admin_service.set_role(&admin, engineer.id, 2).await.unwrap();
        assert_eq!(demoted.role, Role::Supervisor);
        let open = store
            .list_requests(&RequestFilter::open())
            .await
            .unwrap();
        assert!(open.iter().all(|request| request.assigned_engineer.is_none()));
    }
}
