//! Generic resource CRUD commands.
//!
//! `labtrack get labs`, `labtrack create computer -f pc.json`, etc.
//! Translates resource names to typed inventory clients.

use std::path::Path;

use anyhow::Result;
use labtrack_client::{
    Accessory, Computer, InventoryApi, Lab, Part, PartStatus, PartStatuses, Report, ReportKind,
    Resource, ResourceClient, User,
};
use serde::Serialize;

use super::connect_authenticated;

/// Inventory collections reachable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Lab,
    Computer,
    Accessory,
    Report,
    User,
    /// Part statuses of every computer (read-only).
    Status,
}

fn resource_kind(resource: &str) -> Result<Kind> {
    match resource.to_lowercase().as_str() {
        "lab" | "labs" => Ok(Kind::Lab),
        "computer" | "computers" | "pc" | "pcs" => Ok(Kind::Computer),
        "accessory" | "accessories" => Ok(Kind::Accessory),
        "report" | "reports" => Ok(Kind::Report),
        "user" | "users" => Ok(Kind::User),
        "status" | "statuses" => Ok(Kind::Status),
        _ => Err(anyhow::anyhow!("Unknown resource type: {}", resource)),
    }
}

/// Table rendering for a record type.
trait Row {
    const HEADER: &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

fn id_cell(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn status_cell(status: Option<PartStatus>) -> String {
    status.map_or_else(|| "-".to_string(), |s| s.to_string())
}

impl Row for Lab {
    const HEADER: &'static [&'static str] = &["ID", "NAME", "LOCATION"];
    fn cells(&self) -> Vec<String> {
        vec![id_cell(self.id), self.name.clone(), self.location.clone()]
    }
}

impl Row for Computer {
    const HEADER: &'static [&'static str] = &["ID", "NAME", "LAB", "PARTS"];
    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            self.name.clone(),
            self.lab_name.clone(),
            self.parts.len().to_string(),
        ]
    }
}

impl Row for Accessory {
    const HEADER: &'static [&'static str] = &["ID", "NAME", "LAB", "QTY", "STATUS"];
    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            self.name.clone(),
            self.lab_name.clone(),
            self.quantity.to_string(),
            status_cell(self.status),
        ]
    }
}

impl Row for Report {
    const HEADER: &'static [&'static str] = &["ID", "ITEM", "LAB", "STATUS", "DATE", "BY"];
    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            self.item.clone(),
            self.lab.clone(),
            status_cell(self.status),
            self.date.clone().unwrap_or_else(|| "-".into()),
            self.submitted_by.clone().unwrap_or_else(|| "-".into()),
        ]
    }
}

impl Row for User {
    const HEADER: &'static [&'static str] = &["NAME", "EMAIL", "ROLE"];
    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.email.clone(), self.role.clone()]
    }
}

impl Row for PartStatuses {
    const HEADER: &'static [&'static str] = &["COMPUTER", "OVERALL", "ISSUES"];
    fn cells(&self) -> Vec<String> {
        let issues: Vec<String> = Part::ALL
            .into_iter()
            .filter(|p| self.get(*p) != PartStatus::Operational)
            .map(|p| format!("{}={}", p, self.get(p)))
            .collect();
        vec![
            self.com_id.to_string(),
            self.overall().to_string(),
            if issues.is_empty() { "-".into() } else { issues.join(", ") },
        ]
    }
}

fn render_table<T: Row>(rows: &[T]) -> String {
    let cells: Vec<Vec<String>> = rows.iter().map(Row::cells).collect();
    let widths: Vec<usize> = T::HEADER
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|r| r.get(i).map_or(0, String::len))
                .fold(h.len(), usize::max)
        })
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:w$}", v, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(T::HEADER.to_vec())];
    for row in &cells {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

fn print_rows<T: Row + Serialize>(rows: &[T], json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if rows.is_empty() {
        println!("No resources found.");
    } else {
        println!("{}", render_table(rows));
    }
    Ok(())
}

fn parse_record<T: Resource>(json_body: &str) -> Result<T> {
    serde_json::from_str(json_body).map_err(|e| anyhow::anyhow!("Invalid {}: {}", T::NAME, e))
}

async fn get_typed<T: Resource + Row>(
    client: ResourceClient<T>,
    id: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let rows = match id {
        Some(id) => vec![client.get(id).await?],
        None => client.list().await?,
    };
    print_rows(&rows, json_output)
}

async fn create_typed<T: Resource>(client: ResourceClient<T>, json_body: &str) -> Result<()> {
    let created = client.create(&parse_record(json_body)?).await?;
    println!("{} created.", T::NAME);
    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}

async fn update_typed<T: Resource>(
    client: ResourceClient<T>,
    id: &str,
    json_body: &str,
) -> Result<()> {
    let updated = client.update(id, &parse_record(json_body)?).await?;
    println!("{} {} updated.", T::NAME, id);
    println!("{}", serde_json::to_string_pretty(&updated)?);
    Ok(())
}

/// GET a resource (list or get by ID).
pub async fn get(
    resource: &str,
    id: Option<&str>,
    report_kind: Option<&str>,
    json_output: bool,
    config_path: &Path,
) -> Result<()> {
    let kind = resource_kind(resource)?;
    let conn = connect_authenticated(config_path).await?;
    let inventory = InventoryApi::new(conn.api);

    match kind {
        Kind::Lab => get_typed(inventory.labs(), id, json_output).await,
        Kind::Computer => get_typed(inventory.computers(), id, json_output).await,
        Kind::Accessory => get_typed(inventory.accessories(), id, json_output).await,
        Kind::User => get_typed(inventory.users(), id, json_output).await,
        Kind::Report => match report_kind {
            Some(k) => {
                let k: ReportKind = k.parse().map_err(anyhow::Error::msg)?;
                print_rows(&inventory.reports_by(k).await?, json_output)
            }
            None => get_typed(inventory.reports(), id, json_output).await,
        },
        Kind::Status => {
            let mut statuses = inventory.part_statuses().await?;
            if let Some(id) = id {
                let id: i64 = id.parse().map_err(|_| anyhow::anyhow!("Invalid computer id: {}", id))?;
                statuses.retain(|s| s.com_id == id);
            }
            print_rows(&statuses, json_output)
        }
    }
}

/// CREATE a resource.
pub async fn create(resource: &str, json_body: &str, config_path: &Path) -> Result<()> {
    let kind = resource_kind(resource)?;
    let conn = connect_authenticated(config_path).await?;
    let inventory = InventoryApi::new(conn.api);

    match kind {
        Kind::Lab => create_typed(inventory.labs(), json_body).await,
        Kind::Computer => create_typed(inventory.computers(), json_body).await,
        Kind::Accessory => create_typed(inventory.accessories(), json_body).await,
        Kind::Report => create_typed(inventory.reports(), json_body).await,
        Kind::User => create_typed(inventory.users(), json_body).await,
        Kind::Status => anyhow::bail!("Statuses are set with `labtrack mark`."),
    }
}

/// UPDATE a resource (PUT).
pub async fn update(resource: &str, id: &str, json_body: &str, config_path: &Path) -> Result<()> {
    let kind = resource_kind(resource)?;
    let conn = connect_authenticated(config_path).await?;
    let inventory = InventoryApi::new(conn.api);

    match kind {
        Kind::Lab => update_typed(inventory.labs(), id, json_body).await,
        Kind::Computer => update_typed(inventory.computers(), id, json_body).await,
        Kind::Accessory => update_typed(inventory.accessories(), id, json_body).await,
        Kind::Report => update_typed(inventory.reports(), id, json_body).await,
        Kind::User => update_typed(inventory.users(), id, json_body).await,
        Kind::Status => anyhow::bail!("Statuses are set with `labtrack mark`."),
    }
}

/// DELETE a resource. Users are addressed by email.
pub async fn delete(resource: &str, id: &str, config_path: &Path) -> Result<()> {
    let kind = resource_kind(resource)?;
    let conn = connect_authenticated(config_path).await?;
    let inventory = InventoryApi::new(conn.api);

    let name = match kind {
        Kind::Lab => inventory.labs().delete(id).await.map(|_| Lab::NAME),
        Kind::Computer => inventory.computers().delete(id).await.map(|_| Computer::NAME),
        Kind::Accessory => inventory.accessories().delete(id).await.map(|_| Accessory::NAME),
        Kind::Report => inventory.reports().delete(id).await.map(|_| Report::NAME),
        Kind::User => inventory.delete_user_by_email(id).await.map(|_| User::NAME),
        Kind::Status => anyhow::bail!("Statuses cannot be deleted."),
    }?;

    println!("{} {} deleted.", name, id);
    Ok(())
}

/// Record the condition of one part of a computer.
pub async fn mark(computer_id: i64, part: &str, status: &str, config_path: &Path) -> Result<()> {
    let part: Part = part.parse().map_err(anyhow::Error::msg)?;
    let status: PartStatus = status.parse().map_err(anyhow::Error::msg)?;

    let conn = connect_authenticated(config_path).await?;
    InventoryApi::new(conn.api)
        .set_part_status(computer_id, part, status)
        .await?;

    println!("Computer {} {} marked {}.", computer_id, part, status);
    Ok(())
}
