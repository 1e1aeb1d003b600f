//! Application startup and the demo run

use crate::app::cli::api::{load_settings, Args, Settings};
use crate::app::summary::{CallRow, Outcome, RunSummary};
use crate::app::{AppError, AppResult};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::{init_logging, LogTarget};
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::styles::palette_to_clap;
use crate::core::version::long_version;
use crate::executor::api::{ExecutorOptions, FunctionRegistry, LocalExecutor};
use crate::queue::api::{CallRequest, MemoryBackend, QueueOrchestrator};
use clap::{CommandFactory, FromArgMatches};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Exit status when the run was cut short by a signal
const EXIT_INTERRUPTED: i32 = 130;

pub fn startup() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {}", AppError::Runtime(e));
            std::process::exit(1);
        }
    };
    let code = runtime.block_on(run());
    // Stop stray tasks before exiting
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    std::process::exit(code);
}

async fn run() -> i32 {
    let mut args = parse_args();

    // Logging is configured from the file too, so errors here go to stderr
    let settings = match load_settings(&mut args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let color = args.color_enabled();
    if let Err(e) = init_logging(
        args.log_level.as_deref(),
        args.log_format.as_deref(),
        args.log_file_str().as_deref(),
        color,
    ) {
        eprintln!(
            "Error: {}",
            AppError::Logging {
                message: e.to_string()
            }
        );
        return 1;
    }

    log::info!("callqueue {}", long_version());
    if let Some(source) = &settings.source {
        log::info!("Using configuration from {}", source.display());
    }

    match run_calls(&args, &settings).await {
        Ok(summary) => {
            summary.print(color);
            if summary.interrupted {
                EXIT_INTERRUPTED
            } else {
                0
            }
        }
        Err(e) => {
            log_error_with_context(&e, "Running calls through the queue");
            1
        }
    }
}

fn parse_args() -> Args {
    use std::io::IsTerminal;
    let help_color = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
    let matches = Args::command()
        .styles(palette_to_clap(help_color))
        .get_matches();
    match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    }
}

/// Arguments each builtin receives for call number `index` (1-based)
pub fn call_args(function: &str, index: usize) -> Value {
    match function {
        "square" => json!(index),
        "fail" => json!(format!("call {} failed on request", index)),
        "slow" => json!({ "ms": 20 * (index % 5 + 1), "index": index }),
        _ => json!({ "index": index }),
    }
}

/// Enqueue the calls, wait for every result or a shutdown signal, then drain.
pub async fn run_calls(args: &Args, settings: &Settings) -> AppResult<RunSummary> {
    let started = Instant::now();
    let backend = MemoryBackend::new("demo")
        .with_batch_size(settings.backend.batch_size)
        .with_receive_wait(settings.backend.receive_wait);
    let executor = LocalExecutor::start(
        &backend,
        FunctionRegistry::with_builtins(),
        ExecutorOptions {
            workers: args.workers,
            drop_invocations: args.drop_invocations,
            ..Default::default()
        },
    );
    let orchestrator = QueueOrchestrator::new(
        Arc::new(backend.clone()),
        settings.queue.clone(),
        Arc::new(LogTarget::default()),
    )?;

    let shutdown = ShutdownCoordinator::new();
    shutdown.install_signal_handlers();
    let mut signal = shutdown.subscribe();

    let mut pending = Vec::with_capacity(args.calls);
    for index in 1..=args.calls {
        let call_id = format!("call-{:04}", index);
        let call = CallRequest::new(
            call_id.clone(),
            args.function.as_str(),
            call_args(&args.function, index),
        );
        match orchestrator
            .enqueue_call_request(call, backend.response_queue_id())
            .await
        {
            Ok(result) => pending.push((call_id, result)),
            Err(e) => {
                let _ = orchestrator.stop().await;
                executor.shutdown().await;
                return Err(e.into());
            }
        }
    }
    log::info!("Enqueued {} call(s) to {}", args.calls, orchestrator.description());

    let outcomes = futures::future::join_all(
        pending
            .into_iter()
            .map(|(call_id, result)| async move { (call_id, result.await) }),
    );
    tokio::pin!(outcomes);

    let mut completed = None;
    tokio::select! {
        results = &mut outcomes => completed = Some(results),
        _ = signal.wait() => log::warn!("Shutdown requested; stopping the queue engine"),
    }
    let interrupted = completed.is_none();

    // Stopping rejects whatever is still pending, so the join below finishes
    let drain = orchestrator.stop().await?;
    let results = match completed {
        Some(results) => results,
        None => outcomes.await,
    };

    let invocations = executor.invocations();
    let dropped = executor.dropped();
    executor.shutdown().await;

    Ok(RunSummary {
        rows: results
            .into_iter()
            .map(|(call_id, result)| CallRow {
                call_id,
                outcome: Outcome::from_result(result),
            })
            .collect(),
        drain,
        elapsed: started.elapsed(),
        invocations,
        dropped,
        interrupted,
    })
}
