use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app_context::AppContext;

mod config_reload;
mod maintenance;
mod monitor;

/// Spawns every background loop. Each one exits once `shutdown` flips to
/// `true`.
pub fn start_background_jobs(
    app_context: AppContext,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = vec![monitor::start_monitor_job(
        app_context.clone(),
        shutdown.clone(),
    )];

    if app_context.recorder.has_store() {
        handles.push(maintenance::start_maintenance_job(
            app_context.clone(),
            shutdown.clone(),
        ));
    }

    if let Some(config_path) = app_context.config_path.clone() {
        handles.push(config_reload::start_config_hot_reload_job(
            app_context,
            config_path,
            shutdown,
        ));
    }

    handles
}
