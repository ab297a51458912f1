use anyhow::{anyhow, Result};
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use super::{print_json, AppContext};
use crate::domain::{AccessLevel, NewMachine, NewUser, ReportFields, Role};

/// Counts of what `seed` inserted
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SeedSummary {
    pub branches: usize,
    pub users: usize,
    pub machines: usize,
    pub requests: usize,
    pub reports: usize,
}

pub struct SeedCommand;

fn days_ago(days: u64) -> NaiveDate {
    let today = Utc::now().date_naive();
    today.checked_sub_days(Days::new(days)).unwrap_or(today)
}

#[allow(clippy::too_many_arguments)]
fn user(
    username: &str,
    first_name: &str,
    paternal_surname: &str,
    maternal_surname: &str,
    email: &str,
    branch_id: i64,
    role: Role,
    access_level: AccessLevel,
) -> NewUser {
    NewUser {
        username: username.to_string(),
        first_name: first_name.to_string(),
        paternal_surname: paternal_surname.to_string(),
        maternal_surname: maternal_surname.to_string(),
        email: email.to_string(),
        phone: None,
        branch_id: Some(branch_id),
        role,
        access_level,
    }
}

fn machine(
    branch_id: i64,
    model: &str,
    brand: &str,
    purchased_days_ago: u64,
    installed_days_ago: u64,
    maintained_days_ago: Option<u64>,
) -> NewMachine {
    NewMachine {
        branch_id,
        model: model.to_string(),
        brand: brand.to_string(),
        serial_number: None,
        purchased_on: days_ago(purchased_days_ago),
        installed_on: days_ago(installed_days_ago),
        last_maintenance_on: maintained_days_ago.map(days_ago),
    }
}

impl SeedCommand {
    pub fn new() -> Self {
        Self
    }

    /// Insert the sample data set. Refuses to run against a store that already has users.
    pub async fn seed(&self, context: &AppContext) -> Result<SeedSummary> {
        let store = &context.store;
        if store.statistics().await?.users > 0 {
            return Err(anyhow!(
                "The database already contains users; seed only runs on an empty database"
            ));
        }

        let mut summary = SeedSummary::default();

        let centro = store.insert_branch("Sucursal Centro").await?;
        let norte = store.insert_branch("Sucursal Norte").await?;
        let sur = store.insert_branch("Sucursal Sur").await?;
        summary.branches = 3;

        let admin = store
            .insert_user(user("admin", "Admin", "Sistema", "MantenTask", "admin@mantentask.com", centro.id, Role::Engineer, AccessLevel::Administrator))
            .await?;
        let jperez = store
            .insert_user(user("jperez", "Juan", "Pérez", "García", "juan.perez@mantentask.com", centro.id, Role::Engineer, AccessLevel::Advanced))
            .await?;
        let mlopez = store
            .insert_user(user("mlopez", "María", "López", "Sánchez", "maria.lopez@mantentask.com", norte.id, Role::Engineer, AccessLevel::Advanced))
            .await?;
        let crodriguez = store
            .insert_user(user("crodriguez", "Carlos", "Rodríguez", "Martínez", "carlos.rodriguez@mantentask.com", centro.id, Role::Supervisor, AccessLevel::Intermediate))
            .await?;
        let agarcia = store
            .insert_user(user("agarcia", "Ana", "García", "Torres", "ana.garcia@mantentask.com", sur.id, Role::Supervisor, AccessLevel::Intermediate))
            .await?;
        summary.users = 5;

        let machines = [
            machine(centro.id, "Industrial XL-2000", "Siemens", 365, 350, None),
            machine(centro.id, "Compresor Pro 5000", "Atlas Copco", 730, 720, Some(30)),
            machine(norte.id, "Torno CNC TX-300", "Haas", 180, 170, None),
            machine(norte.id, "Soldadora MIG 250", "Lincoln Electric", 90, 85, None),
            machine(sur.id, "Prensa Hidráulica PH-100", "Schuler", 500, 490, Some(60)),
        ];
        let mut machine_ids = Vec::with_capacity(machines.len());
        for new_machine in machines {
            machine_ids.push(store.insert_machine(new_machine).await?.id);
        }
        summary.machines = machine_ids.len();

        let workflow = &context.workflow;
        let requests = [
            (machine_ids[0], &crodriguez, "La máquina presenta ruidos extraños y vibración excesiva durante el funcionamiento.", 2, Some(&jperez)),
            (machine_ids[1], &crodriguez, "El compresor no alcanza la presión requerida. Se necesita revisión urgente.", 1, None),
            (machine_ids[2], &agarcia, "El torno CNC muestra errores en el control numérico. Pantalla parpadeante.", 3, Some(&mlopez)),
            (machine_ids[3], &mlopez, "Mantenimiento preventivo programado. Revisión general de componentes.", 2, Some(&mlopez)),
            (machine_ids[4], &agarcia, "Fuga de aceite hidráulico en el sistema principal. Producción detenida.", 3, Some(&jperez)),
        ];
        let mut completed = Vec::new();
        for (machine_id, creator, description, state, engineer) in requests {
            let request = workflow
                .create_request(creator, machine_id, description, None)
                .await?;
            if let Some(engineer) = engineer {
                workflow
                    .assign_engineer(request.id, &admin, engineer.id)
                    .await?;
                if state == 3 {
                    completed.push((request.id, engineer));
                }
            }
            if state != 1 {
                workflow.change_state(request.id, &admin, state).await?;
            }
            summary.requests += 1;
        }

        let reports = [
            "Se realizó diagnóstico completo del sistema de control numérico.",
            "Se atendió la emergencia de fuga de aceite hidráulico.",
        ];
        let work = [
            "Actualización de firmware del controlador. Reemplazo de cable de pantalla defectuoso. Calibración de ejes X, Y, Z.",
            "Identificación de sello defectuoso en cilindro principal. Recarga del sistema hidráulico. Pruebas de presión satisfactorias.",
        ];
        let recommendations = [
            None,
            Some("Monitorear la prensa durante las próximas 48 horas.".to_string()),
        ];
        for (index, (request_id, engineer)) in completed.into_iter().enumerate() {
            let fields = ReportFields {
                description: reports[index % reports.len()].to_string(),
                work_performed: Some(work[index % work.len()].to_string()),
                parts_replaced: None,
                recommendations: recommendations[index % recommendations.len()].clone(),
            };
            workflow.create_report(request_id, engineer, fields).await?;
            summary.reports += 1;
        }

        info!(?summary, "Sample data loaded");
        Ok(summary)
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let summary = self.seed(context).await?;
        print_json(&summary)
    }
}

impl Default for SeedCommand {
    fn default() -> Self {
        Self::new()
    }
}
