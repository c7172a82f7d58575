use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use flume::Receiver;
use tracing::info;

use facegrid::events::drain;
use facegrid::grid::{ClickModifier, ScrollMetrics};
use facegrid::overlay::{MenuAction, Rect, Size};
use facegrid::{
    ActionOutcome, ControllerConfig, ListSettings, MemoryBridge, PhotoTagController, Prompt,
    ViewEvent,
};

/// Drive a short scripted session against the in-memory backend and log the
/// view events it produces.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("facegrid=info".parse().context("invalid log directive")?),
        )
        .init();

    let config = ControllerConfig::from_env();
    info!(?config, "Starting demo session");

    let bridge = Arc::new(MemoryBridge::sample());
    let (mut controller, events) =
        PhotoTagController::new(bridge, config, ListSettings::default());

    controller.start();
    controller.set_viewport(Size::new(1280.0, 800.0));
    controller.load_people();
    controller.settle().await;
    flush(&events);

    // The first page fits on screen without filling it.
    controller.report_layout(ScrollMetrics {
        scroll_top: 0.0,
        viewport_height: 800.0,
        content_height: 1200.0,
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    flush(&events);

    // Scroll to the bottom so the remaining page arrives.
    controller.on_scroll(ScrollMetrics {
        scroll_top: 7200.0,
        viewport_height: 800.0,
        content_height: 8000.0,
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    flush(&events);

    controller.click_photo(3, ClickModifier::None);
    controller.lightbox_next();
    controller.press_escape();
    flush(&events);

    controller.click_photo(1, ClickModifier::Toggle);
    controller.click_photo(4, ClickModifier::Range);
    controller.open_photo_menu(4, Rect::new(1200.0, 40.0, 24.0, 24.0));
    if controller.choose(MenuAction::TransferPhotos)? == ActionOutcome::Started {
        controller.settle().await;
        let target = flush(&events).into_iter().find_map(|event| match event {
            ViewEvent::Prompt(Prompt::Transfer { targets }) => targets.into_iter().next(),
            _ => None,
        });
        if let Some(target) = target {
            controller.transfer_to(&target.name)?;
            controller.settle().await;
            flush(&events);
        }
    }

    controller.shutdown();
    flush(&events);
    Ok(())
}

/// Log every queued event and hand them back.
fn flush(events: &Receiver<ViewEvent>) -> Vec<ViewEvent> {
    let drained = drain(events);
    for event in &drained {
        log_event(event);
    }
    drained
}

fn log_event(event: &ViewEvent) {
    match event {
        ViewEvent::PeopleChanged { people, letters, .. } => {
            let letters: String = letters.iter().collect();
            info!(count = people.len(), %letters, "People list");
        }
        ViewEvent::PersonActivated { title, .. } => info!(%title, "Person activated"),
        ViewEvent::TilesAppended { start, photos } => {
            info!(start, count = photos.len(), "Tiles appended")
        }
        ViewEvent::GridStatus(status) => info!(status = %status.label(), "Grid status"),
        ViewEvent::Status(message) => info!(%message, "Status"),
        ViewEvent::LightboxShown { index, total, .. } => {
            info!(position = index + 1, total, "Lightbox")
        }
        ViewEvent::BulkFinished(report) => info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Photo operation finished"
        ),
        other => tracing::debug!(?other, "View event"),
    }
}
