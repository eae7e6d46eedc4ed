use crate::errors::DbError;
use crate::geo::GeoPoint;
use crate::model::Event;
use crate::repository::EventRepository;
use crate::telemetry;
use crate::types::DocumentId;
use crate::update::UpdateReport;
use std::io::Write;

use super::command::Command;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Runs `cmd` and prints its result to stdout.
pub async fn run(repo: &EventRepository, cmd: Command, mode: OutputMode) -> Result<(), DbError> {
    let mut stdout = std::io::stdout();
    run_with_format(repo, cmd, mode, &mut stdout).await
}

pub async fn run_with_format(
    repo: &EventRepository,
    cmd: Command,
    mode: OutputMode,
    out: &mut (dyn Write + Send),
) -> Result<(), DbError> {
    match cmd {
        Command::Nearby { lon, lat, distance } => {
            let events = repo.find_nearby(GeoPoint::new(lon, lat), distance).await?;
            print_events(&events, mode, out)
        }
        Command::NearbyPage { lon, lat, distance, page_size, page } => {
            let events = repo
                .find_nearby_page(GeoPoint::new(lon, lat), distance, page_size, page)
                .await?
                .into_items();
            print_events(&events, mode, out)
        }
        Command::Get { id } => {
            let event = repo.get_event(&DocumentId::from(id)).await?;
            match mode {
                OutputMode::Json => writeln!(out, "{}", serde_json::to_string_pretty(&event)?)?,
                OutputMode::Human => writeln!(
                    out,
                    "{} ({}) at [{:.5}, {:.5}] in {}, visitors={}",
                    event.name,
                    event.id,
                    event.location.longitude(),
                    event.location.latitude(),
                    event.address.city,
                    event.visitor_count()
                )?,
            }
            Ok(())
        }
        Command::Visit { id } => {
            let report = repo.increment_visitor_count(&DocumentId::from(id.as_str())).await?;
            print_update("visit", &id, &report, mode, out)
        }
        Command::Reset { id, checked } => {
            let id_ref = DocumentId::from(id.as_str());
            let report = if checked {
                repo.reset_visitor_count_checked(&id_ref).await?
            } else {
                repo.reset_visitor_count(&id_ref).await?
            };
            print_update("reset", &id, &report, mode, out)
        }
        Command::Info => {
            match mode {
                OutputMode::Json => {
                    let m = telemetry::snapshot();
                    let json = serde_json::json!({
                        "collection": repo.link().to_string(),
                        "queries": m.queries_total,
                        "cursor_hops": m.cursor_hops_total,
                        "writes": m.writes_total,
                        "conflicts": m.conflicts_total,
                        "retries_exhausted": m.retries_exhausted_total,
                    });
                    writeln!(out, "{json}")?;
                }
                OutputMode::Human => {
                    writeln!(out, "collection {}", repo.link())?;
                    write!(out, "{}", telemetry::metrics_text())?;
                }
            }
            Ok(())
        }
    }
}

fn print_events(events: &[Event], mode: OutputMode, out: &mut (dyn Write + Send)) -> Result<(), DbError> {
    match mode {
        OutputMode::Json => writeln!(out, "{}", serde_json::to_string(events)?)?,
        OutputMode::Human => {
            for e in events {
                writeln!(out, "{}", e.name)?;
            }
        }
    }
    Ok(())
}

fn print_update(
    action: &str,
    id: &str,
    report: &UpdateReport,
    mode: OutputMode,
    out: &mut (dyn Write + Send),
) -> Result<(), DbError> {
    match mode {
        OutputMode::Json => {
            let json = serde_json::json!({
                "action": action,
                "id": id,
                "visitors": report.value,
                "attempts": report.attempts,
                "conflicts": report.conflicts,
                "etag": report.etag.as_str(),
            });
            writeln!(out, "{json}")?;
        }
        OutputMode::Human => {
            let visitors = report.value.as_ref().map_or_else(|| "?".to_string(), ToString::to_string);
            writeln!(out, "{action} {id}: visitors={visitors} after {} attempt(s)", report.attempts)?;
        }
    }
    Ok(())
}
