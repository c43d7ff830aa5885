use anyhow::{Context, Result};
use chrono::{Datelike, Utc};

use linkup_calendar::{month_grid, GridOptions};
use linkup_core::{App, AppError, ConfigError};
use linkup_store::{AppState, StoreHandle};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    linkup_core::init()?;

    // Create and initialize application
    let app = App::new()?;
    app.initialize()?;

    tracing::info!("LinkUp started");
    tracing::info!("Config directory: {}", app.config().config_dir.display());

    let outcome = summarize_groups(&app).await;

    // Graceful shutdown
    app.shutdown()?;

    if let Err(err) = outcome {
        tracing::error!("{}", err);
        eprintln!("{}", err.user_message());
        return Err(err.into());
    }

    Ok(())
}

/// Load the viewer's state and log a month overview per group.
async fn summarize_groups(app: &App) -> Result<(), AppError> {
    let viewer = app.viewer_id()?.to_string();
    let store = StoreHandle::sqlite(app.database_path())
        .with_context(|| format!("Failed to open {}", app.database_path().display()))?;

    let mut state = AppState::new(store, viewer);
    if let Some(email) = app.viewer_email() {
        state = state.with_email(email);
    }
    state.load().await?;

    let tz = app.time_zone();
    let today = Utc::now().with_timezone(&tz).date_naive();
    let options = GridOptions {
        week_start: app.week_start(),
        day_hours: app.day_hours(),
    };

    for group in state.groups() {
        let events: Vec<_> = state.group_events(&group.id).into_iter().cloned().collect();
        let slots = state.availability_overlay(&group.id);
        let grid = month_grid(today.year(), today.month(), &events, &slots, &tz, &options)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let busy_days = grid.cells.iter().filter(|c| c.in_month && !c.events.is_empty()).count();
        let open_days = grid.cells.iter().filter(|c| c.has_availability).count();
        let voted_days = grid.cells.iter().filter(|c| c.has_voted).count();
        tracing::info!(
            "{} ({} members): {} days with events, {} days with proposals, {} voted",
            group.name,
            group.members.len(),
            busy_days,
            open_days,
            voted_days
        );
    }

    Ok(())
}
