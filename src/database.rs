// SQLite persistence behind the `database` feature

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::domain::{
    AccessLevel, Branch, BranchId, DocumentHandle, Machine, MachineId, NewMachine, NewRequest,
    NewUser, Report, ReportFields, Request, RequestId, RequestState, Role, User, UserId,
};
use crate::store::{
    Entity, MachineFilter, ReportFilter, RequestFilter, StoreError, StoreStatistics, TicketStore,
    UserFilter,
};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Owns the connection pool and applies migrations
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (creating if needed) the database and optionally run migrations
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            info!("Opening database at {}", config.url);
        }

        // Every connection to `:memory:` is a separate database, so pin one
        // connection for the lifetime of the pool.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };
        let pool = pool_options.connect_with(options).await?;

        if config.auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    /// Get database pool for queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A ticket store sharing this manager's pool
    pub fn ticket_store(&self) -> SqliteTicketStore {
        SqliteTicketStore::new(self.pool.clone())
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

/// [`TicketStore`] over the tables created by `migrations/`
#[derive(Debug, Clone)]
pub struct SqliteTicketStore {
    pool: SqlitePool,
}

const REQUEST_COLUMNS: &str = "id, machine_id, created_by, description, scheduled_for, state_code, \
     assigned_engineer, created_at, updated_at, version";

const USER_COLUMNS: &str = "id, username, first_name, paternal_surname, maternal_surname, email, \
     phone, branch_id, role_code, access_level_code, active, joined_at";

const MACHINE_COLUMNS: &str = "id, branch_id, model, brand, serial_number, purchased_on, \
     installed_on, last_maintenance_on";

const REPORT_COLUMNS: &str = "request_id, machine_id, author_id, description, work_performed, \
     parts_replaced, recommendations, created_at, document_location, document_generated_at";

fn corrupt(what: &str, code: i64) -> StoreError {
    StoreError::Corrupt(format!("unknown {what} code {code}"))
}

fn request_from_row(row: &SqliteRow) -> Result<Request, StoreError> {
    let state_code: i64 = row.try_get("state_code")?;
    Ok(Request {
        id: row.try_get("id")?,
        machine_id: row.try_get("machine_id")?,
        created_by: row.try_get("created_by")?,
        description: row.try_get("description")?,
        scheduled_for: row.try_get("scheduled_for")?,
        state: RequestState::from_code(state_code).ok_or_else(|| corrupt("state", state_code))?,
        assigned_engineer: row.try_get("assigned_engineer")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let role_code: i64 = row.try_get("role_code")?;
    let level_code: i64 = row.try_get("access_level_code")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        paternal_surname: row.try_get("paternal_surname")?,
        maternal_surname: row.try_get("maternal_surname")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        branch_id: row.try_get("branch_id")?,
        role: Role::from_code(role_code).ok_or_else(|| corrupt("role", role_code))?,
        access_level: AccessLevel::from_code(level_code)
            .ok_or_else(|| corrupt("access level", level_code))?,
        active: row.try_get("active")?,
        joined_at: row.try_get("joined_at")?,
    })
}

fn machine_from_row(row: &SqliteRow) -> Result<Machine, StoreError> {
    Ok(Machine {
        id: row.try_get("id")?,
        branch_id: row.try_get("branch_id")?,
        model: row.try_get("model")?,
        brand: row.try_get("brand")?,
        serial_number: row.try_get("serial_number")?,
        purchased_on: row.try_get("purchased_on")?,
        installed_on: row.try_get("installed_on")?,
        last_maintenance_on: row.try_get("last_maintenance_on")?,
    })
}

fn report_from_row(row: &SqliteRow) -> Result<Report, StoreError> {
    let location: Option<String> = row.try_get("document_location")?;
    let generated_at: Option<DateTime<Utc>> = row.try_get("document_generated_at")?;
    let document = match (location, generated_at) {
        (Some(location), Some(generated_at)) => Some(DocumentHandle {
            location,
            generated_at,
        }),
        _ => None,
    };

    Ok(Report {
        request_id: row.try_get("request_id")?,
        machine_id: row.try_get("machine_id")?,
        author_id: row.try_get("author_id")?,
        fields: ReportFields {
            description: row.try_get("description")?,
            work_performed: row.try_get("work_performed")?,
            parts_replaced: row.try_get("parts_replaced")?,
            recommendations: row.try_get("recommendations")?,
        },
        created_at: row.try_get("created_at")?,
        document,
    })
}

impl SqliteTicketStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, table: &str, id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query(&format!("SELECT 1 FROM {table} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn count(&self, sql: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn count_state(&self, state: RequestState) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM requests WHERE state_code = ?1")
            .bind(state.code())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl TicketStore for SqliteTicketStore {
    async fn get_request(&self, id: RequestId) -> Result<Request, StoreError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Request, id))?;
        request_from_row(&row)
    }

    async fn insert_request(&self, request: NewRequest) -> Result<Request, StoreError> {
        if !self.exists("machines", request.machine_id).await? {
            return Err(StoreError::not_found(Entity::Machine, request.machine_id));
        }
        if !self.exists("users", request.created_by).await? {
            return Err(StoreError::not_found(Entity::User, request.created_by));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO requests (machine_id, created_by, description, scheduled_for,
                                  state_code, assigned_engineer, created_at, updated_at, version)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6, 0)
            "#,
        )
        .bind(request.machine_id)
        .bind(request.created_by)
        .bind(&request.description)
        .bind(request.scheduled_for)
        .bind(RequestState::Pending.code())
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(request_id = id, "Inserted request");
        self.get_request(id).await
    }

    async fn save_request(&self, request: &Request) -> Result<Request, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET machine_id = ?1, description = ?2, scheduled_for = ?3, state_code = ?4,
                assigned_engineer = ?5, updated_at = ?6, version = version + 1
            WHERE id = ?7 AND version = ?8
            "#,
        )
        .bind(request.machine_id)
        .bind(&request.description)
        .bind(request.scheduled_for)
        .bind(request.state.code())
        .bind(request.assigned_engineer)
        .bind(request.updated_at)
        .bind(request.id)
        .bind(request.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return if self.exists("requests", request.id).await? {
                Err(StoreError::VersionConflict {
                    request_id: request.id,
                    expected: request.version,
                })
            } else {
                Err(StoreError::not_found(Entity::Request, request.id))
            };
        }

        let mut saved = request.clone();
        saved.version += 1;
        Ok(saved)
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE 1 = 1"));

        if !filter.states.is_empty() {
            query.push(" AND state_code IN (");
            let mut codes = query.separated(", ");
            for state in &filter.states {
                codes.push_bind(state.code());
            }
            codes.push_unseparated(")");
        }
        if let Some(machine_id) = filter.machine_id {
            query.push(" AND machine_id = ").push_bind(machine_id);
        }
        if let Some(created_by) = filter.created_by {
            query.push(" AND created_by = ").push_bind(created_by);
        }
        if let Some(engineer) = filter.assigned_engineer {
            query.push(" AND assigned_engineer = ").push_bind(engineer);
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            let request = request_from_row(row)?;
            // Description search runs here for Unicode-aware case folding
            if filter.matches(&request) {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::User, id))?;
        user_from_row(&row)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ?1 OR username = ?2")
                .bind(&user.email)
                .bind(&user.username)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(id) = existing {
            return Err(StoreError::Duplicate {
                entity: Entity::User,
                id,
            });
        }

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, first_name, paternal_surname, maternal_surname, email,
                               phone, branch_id, role_code, access_level_code, active, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10)
            "#,
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.paternal_surname)
        .bind(&user.maternal_surname)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.branch_id)
        .bind(user.role.code())
        .bind(user.access_level.code())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_user(result.last_insert_rowid()).await
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?1, first_name = ?2, paternal_surname = ?3, maternal_surname = ?4,
                email = ?5, phone = ?6, branch_id = ?7, role_code = ?8, access_level_code = ?9,
                active = ?10
            WHERE id = ?11
            "#,
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.paternal_surname)
        .bind(&user.maternal_surname)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.branch_id)
        .bind(user.role.code())
        .bind(user.access_level.code())
        .bind(user.active)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Duplicate {
                entity: Entity::User,
                id: user.id,
            },
            _ => e.into(),
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::User, user.id));
        }
        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1"));
        if let Some(role) = filter.role {
            query.push(" AND role_code = ").push_bind(role.code());
        }
        if let Some(active) = filter.active {
            query.push(" AND active = ").push_bind(active);
        }
        query.push(" ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn get_branch(&self, id: BranchId) -> Result<Branch, StoreError> {
        let row = sqlx::query("SELECT id, name FROM branches WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Branch, id))?;
        Ok(Branch {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }

    async fn insert_branch(&self, name: &str) -> Result<Branch, StoreError> {
        let result = sqlx::query("INSERT INTO branches (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(Branch {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    async fn get_machine(&self, id: MachineId) -> Result<Machine, StoreError> {
        let row = sqlx::query(&format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Machine, id))?;
        machine_from_row(&row)
    }

    async fn insert_machine(&self, machine: NewMachine) -> Result<Machine, StoreError> {
        if !self.exists("branches", machine.branch_id).await? {
            return Err(StoreError::not_found(Entity::Branch, machine.branch_id));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO machines (branch_id, model, brand, serial_number, purchased_on,
                                  installed_on, last_maintenance_on)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(machine.branch_id)
        .bind(&machine.model)
        .bind(&machine.brand)
        .bind(&machine.serial_number)
        .bind(machine.purchased_on)
        .bind(machine.installed_on)
        .bind(machine.last_maintenance_on)
        .execute(&self.pool)
        .await?;

        self.get_machine(result.last_insert_rowid()).await
    }

    async fn save_machine(&self, machine: &Machine) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE machines
            SET branch_id = ?1, model = ?2, brand = ?3, serial_number = ?4, purchased_on = ?5,
                installed_on = ?6, last_maintenance_on = ?7
            WHERE id = ?8
            "#,
        )
        .bind(machine.branch_id)
        .bind(&machine.model)
        .bind(&machine.brand)
        .bind(&machine.serial_number)
        .bind(machine.purchased_on)
        .bind(machine.installed_on)
        .bind(machine.last_maintenance_on)
        .bind(machine.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Machine, machine.id));
        }
        Ok(())
    }

    async fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE 1 = 1"));
        if let Some(branch_id) = filter.branch_id {
            query.push(" AND branch_id = ").push_bind(branch_id);
        }
        query.push(" ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut machines = Vec::with_capacity(rows.len());
        for row in &rows {
            let machine = machine_from_row(row)?;
            // Brand and search compare case-insensitively beyond ASCII
            if filter.matches(&machine) {
                machines.push(machine);
            }
        }
        Ok(machines)
    }

    async fn save_report(&self, report: &Report) -> Result<(), StoreError> {
        if !self.exists("requests", report.request_id).await? {
            return Err(StoreError::not_found(Entity::Request, report.request_id));
        }

        let (location, generated_at) = match &report.document {
            Some(document) => (Some(document.location.clone()), Some(document.generated_at)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO reports (request_id, machine_id, author_id, description, work_performed,
                                 parts_replaced, recommendations, created_at,
                                 document_location, document_generated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(report.request_id)
        .bind(report.machine_id)
        .bind(report.author_id)
        .bind(&report.fields.description)
        .bind(&report.fields.work_performed)
        .bind(&report.fields.parts_replaced)
        .bind(&report.fields.recommendations)
        .bind(report.created_at)
        .bind(location)
        .bind(generated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Duplicate {
                entity: Entity::Report,
                id: report.request_id,
            },
            _ => e.into(),
        })?;

        Ok(())
    }

    async fn get_report(&self, request_id: RequestId) -> Result<Report, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE request_id = ?1"
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(Entity::Report, request_id))?;
        report_from_row(&row)
    }

    async fn report_exists_for(&self, request_id: RequestId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM reports WHERE request_id = ?1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {REPORT_COLUMNS} FROM reports WHERE 1 = 1"));
        if let Some(machine_id) = filter.machine_id {
            query.push(" AND machine_id = ").push_bind(machine_id);
        }
        if let Some(author_id) = filter.author_id {
            query.push(" AND author_id = ").push_bind(author_id);
        }
        query.push(" ORDER BY created_at DESC, request_id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(report_from_row).collect()
    }

    async fn attach_document(
        &self,
        request_id: RequestId,
        document: &DocumentHandle,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE reports SET document_location = ?1, document_generated_at = ?2 WHERE request_id = ?3",
        )
        .bind(&document.location)
        .bind(document.generated_at)
        .bind(request_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Report, request_id));
        }
        Ok(())
    }

    async fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        Ok(StoreStatistics {
            users: self.count("SELECT COUNT(*) FROM users").await?,
            requests: self.count("SELECT COUNT(*) FROM requests").await?,
            machines: self.count("SELECT COUNT(*) FROM machines").await?,
            branches: self.count("SELECT COUNT(*) FROM branches").await?,
            pending_requests: self.count_state(RequestState::Pending).await?,
            in_progress_requests: self.count_state(RequestState::InProgress).await?,
            completed_requests: self.count_state(RequestState::Completed).await?,
        })
    }
}
