//! Poll pending generation jobs.

use std::path::Path;
use std::sync::Arc;

use flowboard_board_model::diagram::Diagram;
use flowboard_common::config::AppConfig;
use flowboard_job_poller::{HttpJobBackend, JobPoller, PollNotice};
use flowboard_render_engine::FfmpegStillExtractor;

use super::{cancel_on_ctrl_c, open_storyboard, save_storyboard};

pub async fn run(path: &Path, config: &AppConfig, until_idle: bool) -> anyhow::Result<()> {
    let mut story = open_storyboard(path)?;

    let pending = story.diagram().pending_connectors().len();
    if pending == 0 {
        println!("No pending generation jobs.");
        return Ok(());
    }
    println!("Polling {pending} pending job(s)...");

    let stills_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("stills");
    let backend = Arc::new(HttpJobBackend::new(&config.backend)?);
    let mut poller = JobPoller::new(backend, config.poller.clone())
        .with_still_extractor(Arc::new(FfmpegStillExtractor::new(stills_dir)));

    let notices = if until_idle {
        cancel_on_ctrl_c(poller.cancel_flag());
        let report = poller.run_until_idle(&mut story).await;
        println!(
            "{} tick(s): {} completed, {} failed, {} removed",
            report.ticks, report.completed, report.failed, report.removed
        );
        if report.cancelled {
            println!("Polling interrupted.");
        }
        report.notices
    } else {
        let summary = poller.tick(&mut story).await;
        println!(
            "Checked {}: {} completed, {} failed, {} removed, {} still pending",
            summary.checked,
            summary.completed,
            summary.failed,
            summary.removed,
            summary.still_pending
        );
        summary.notices
    };

    for notice in &notices {
        let tag = match notice {
            PollNotice::ClipReady { .. } => "OK",
            PollNotice::JobFailed { .. } => "FAIL",
            PollNotice::TransportFailure { .. } => "ERROR",
        };
        println!("[{tag}] {}", notice.message());
    }
    if poller.is_halted() {
        println!("Polling stopped after a transport failure; fix the backend and poll again.");
    }

    save_storyboard(&mut story, path)?;
    Ok(())
}
