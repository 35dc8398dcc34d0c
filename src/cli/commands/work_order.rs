//! Work order CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::ids::WorkOrderId;
use crate::domain::models::{MissionPriority, WorkOrder, WorkOrderStatus};
use crate::domain::ports::WorkOrderFilter;
use crate::service::FleetService;

#[derive(Args, Debug)]
pub struct WorkOrderArgs {
    #[command(subcommand)]
    pub command: WorkOrderCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkOrderCommands {
    /// Submit a new work order
    Submit {
        work_type: String,
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: String,
        #[arg(short, long, default_value_t = 3)]
        retry_limit: u32,
        /// IDs of work orders that must complete before this one is ready
        #[arg(short, long, value_delimiter = ',')]
        depends_on: Vec<String>,
    },
    /// List work orders, optionally filtered by status
    List {
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Show a single work order
    Show { id: String },
    /// Patch a work order's status
    PatchStatus { id: String, status: String },
    /// Cancel a work order
    Delete { id: String },
    /// Assign as many ready work orders as possible to available pilots
    Dispatch {
        #[arg(short, long, default_value_t = 10)]
        max: usize,
    },
    /// Wire an existing work order as a dependency of another
    AddDependency {
        id: String,
        depends_on: String,
    },
}

pub(crate) fn parse_priority(s: &str) -> FleetResult<MissionPriority> {
    match s {
        "critical" => Ok(MissionPriority::Critical),
        "high" => Ok(MissionPriority::High),
        "medium" => Ok(MissionPriority::Medium),
        "low" => Ok(MissionPriority::Low),
        other => Err(crate::domain::errors::FleetError::InvalidInput(format!("unknown priority: {other}"))),
    }
}

fn parse_status(s: &str) -> FleetResult<WorkOrderStatus> {
    match s {
        "pending" => Ok(WorkOrderStatus::Pending),
        "assigned" => Ok(WorkOrderStatus::Assigned),
        "accepted" => Ok(WorkOrderStatus::Accepted),
        "in_progress" => Ok(WorkOrderStatus::InProgress),
        "completed" => Ok(WorkOrderStatus::Completed),
        "failed" => Ok(WorkOrderStatus::Failed),
        "cancelled" => Ok(WorkOrderStatus::Cancelled),
        other => Err(crate::domain::errors::FleetError::InvalidInput(format!("unknown status: {other}"))),
    }
}

#[derive(Debug, Serialize)]
pub struct WorkOrderOutput {
    pub id: String,
    pub work_type: String,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<String>,
    pub retry_count: u32,
}

impl From<&WorkOrder> for WorkOrderOutput {
    fn from(wo: &WorkOrder) -> Self {
        Self {
            id: wo.id.to_string(),
            work_type: wo.work_type.clone(),
            status: format!("{:?}", wo.status),
            priority: format!("{:?}", wo.priority),
            assigned_to: wo.assigned_to.clone(),
            retry_count: wo.retry_count,
        }
    }
}

impl CommandOutput for WorkOrderOutput {
    fn to_human(&self) -> String {
        format!(
            "{} [{}] {} priority={} assigned_to={}",
            self.id,
            self.status,
            self.work_type,
            self.priority,
            self.assigned_to.as_deref().unwrap_or("-")
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct WorkOrderListOutput {
    pub work_orders: Vec<WorkOrderOutput>,
}

impl CommandOutput for WorkOrderListOutput {
    fn to_human(&self) -> String {
        if self.work_orders.is_empty() {
            return "No work orders found.".to_string();
        }
        self.work_orders.iter().map(WorkOrderOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct DispatchOutput {
    pub assigned: usize,
}

impl CommandOutput for DispatchOutput {
    fn to_human(&self) -> String {
        format!("dispatched {} work order(s)", self.assigned)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: WorkOrderArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        WorkOrderCommands::Submit { work_type, description, priority, retry_limit, depends_on } => {
            let mut work_order = WorkOrder::new(work_type, description, parse_priority(&priority)?, retry_limit);
            work_order.dependencies = depends_on.iter().map(|id| id.parse()).collect::<Result<Vec<_>, _>>()?;
            let created = service.create_work_order(work_order).await?;
            output(&WorkOrderOutput::from(&created), json);
        }
        WorkOrderCommands::List { status } => {
            let filter = WorkOrderFilter { status: status.as_deref().map(parse_status).transpose()?, ..Default::default() };
            let work_orders = service.list_work_orders(filter).await?;
            output(&WorkOrderListOutput { work_orders: work_orders.iter().map(WorkOrderOutput::from).collect() }, json);
        }
        WorkOrderCommands::Show { id } => {
            let id: WorkOrderId = id.parse()?;
            let work_order = service
                .get_work_order(id)
                .await?
                .ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("work order {id}")))?;
            output(&WorkOrderOutput::from(&work_order), json);
        }
        WorkOrderCommands::PatchStatus { id, status } => {
            let id: WorkOrderId = id.parse()?;
            let updated = service.patch_work_order_status(id, parse_status(&status)?).await?;
            output(&WorkOrderOutput::from(&updated), json);
        }
        WorkOrderCommands::Delete { id } => {
            let id: WorkOrderId = id.parse()?;
            service.delete_work_order(id).await?;
        }
        WorkOrderCommands::Dispatch { max } => {
            let assigned = service.dispatch(max).await?;
            output(&DispatchOutput { assigned }, json);
        }
        WorkOrderCommands::AddDependency { id, depends_on } => {
            let id: WorkOrderId = id.parse()?;
            let depends_on: WorkOrderId = depends_on.parse()?;
            service.add_work_order_dependency(id, depends_on).await?;
        }
    }
    Ok(())
}
