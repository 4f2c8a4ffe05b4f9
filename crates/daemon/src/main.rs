// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI entrypoint: `start`/`stop`/`status`/`init`, exit codes per §6.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use assistantd_core::EnvName;
use assistantd_daemon::routes::register_core_routes;
use assistantd_daemon::supervisor::SupervisorTuning;
use assistantd_daemon::{lifecycle, listener::ListenCtx, Config, ServiceFacade, Supervisor};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "assistantd", version = assistantd_daemon::env::PROTOCOL_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bind the transport, register core routes, and serve until signaled.
    Start {
        #[arg(long)]
        env: Option<String>,
    },
    /// Signal a running daemon in the given environment to shut down.
    Stop {
        #[arg(long)]
        env: Option<String>,
    },
    /// Report whether a daemon is running in the given environment.
    Status {
        #[arg(long)]
        env: Option<String>,
    },
    /// Materialize the on-disk layout for an environment without serving.
    Init {
        #[arg(long)]
        env: Option<String>,
        #[arg(long)]
        force: bool,
    },
}

const EXIT_OK: u8 = 0;
const EXIT_ALREADY_RUNNING: u8 = 2;
const EXIT_ENDPOINT_CONFLICT: u8 = 3;
const EXIT_BIND_FAILED: u8 = 4;
const EXIT_ENV_INVALID: u8 = 5;
const EXIT_GENERIC: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Start { env } => run_start(env.as_deref()).await,
        Command::Stop { env } => run_stop(env.as_deref()),
        Command::Status { env } => run_status(env.as_deref()),
        Command::Init { env, force } => run_init(env.as_deref(), force),
    };
    ExitCode::from(code)
}

fn init_logging(ctx: &assistantd_core::EnvironmentContext) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(ctx.log_dir(), "assistantd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,assistantd=debug".into()),
        )
        .with_writer(non_blocking)
        .init();
    guard
}

async fn run_start(env_flag: Option<&str>) -> u8 {
    let env = match assistantd_daemon::env::resolve_env(env_flag) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("invalid environment: {e}");
            return EXIT_ENV_INVALID;
        }
    };
    let ctx = match assistantd_daemon::env::build_context(env) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("failed to resolve paths: {e}");
            return EXIT_GENERIC;
        }
    };
    let _log_guard = init_logging(&ctx);

    let config = Config::from_context(ctx);
    let startup = match lifecycle::startup(config).await {
        Ok(result) => result,
        Err(e) => return report_startup_failure(e),
    };

    let mut daemon = startup.daemon;
    let facade = Arc::new(ServiceFacade::new());
    let supervisor = Supervisor::new(daemon.config.connectors_path.clone(), supervisor_tuning());
    facade.register(supervisor);

    let mut builder = assistantd_daemon::router::RouterBuilder::new();
    if let Err(e) = register_core_routes(&mut builder, Arc::clone(&facade), daemon.start_time, env) {
        error!(error = %e, "failed to register core routes");
        daemon.shutdown();
        return EXIT_GENERIC;
    }
    let router = Arc::new(builder.freeze());

    let shutdown = CancellationToken::new();
    let listen_ctx = Arc::new(ListenCtx {
        router,
        own_uid: current_uid(),
        session_token: assistantd_daemon::env::session_token(),
        dedupe_window: assistantd_daemon::env::error_dedupe_window(),
        ipc_timeout: assistantd_daemon::env::ipc_timeout(),
        route_deadline: assistantd_daemon::env::route_deadline(),
        inflight_cap: assistantd_daemon::env::inflight_cap(),
        write_stall_deadline: assistantd_daemon::env::write_stall_deadline(),
        shutdown: shutdown.clone(),
        start_time: daemon.start_time,
    });

    info!(env = %env, "assistantd serving");
    let listener_task =
        tokio::spawn(assistantd_daemon::listener::Listener::new(startup.listener, listen_ctx).run());

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining");
    shutdown.cancel();

    let drain = assistantd_daemon::env::drain_timeout();
    if tokio::time::timeout(drain, listener_task).await.is_err() {
        warn!("listener task did not settle within the drain timeout");
    }

    daemon.shutdown();
    EXIT_OK
}

fn report_startup_failure(e: lifecycle::LifecycleError) -> u8 {
    use lifecycle::LifecycleError::*;
    match e {
        LockFailed(_) => {
            eprintln!("a daemon is already running in this environment");
            EXIT_ALREADY_RUNNING
        }
        EndpointConflict(path, pid) => {
            eprintln!("endpoint file {} refers to a live daemon (pid {pid})", path.display());
            EXIT_ENDPOINT_CONFLICT
        }
        BindFailed(path, source) => {
            eprintln!("failed to bind transport at {}: {source}", path.display());
            EXIT_BIND_FAILED
        }
        other => {
            eprintln!("startup failed: {other}");
            EXIT_GENERIC
        }
    }
}

fn run_stop(env_flag: Option<&str>) -> u8 {
    let (env, ctx) = match resolve_env_and_context(env_flag) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    let config = Config::from_context(ctx);
    match read_pid(&config.lock_path) {
        Some(pid) => {
            if signal_terminate(pid) {
                println!("sent shutdown signal to {env} daemon (pid {pid})");
                EXIT_OK
            } else {
                eprintln!("daemon recorded at pid {pid} is not reachable");
                EXIT_GENERIC
            }
        }
        None => {
            eprintln!("no daemon is running in {env}");
            EXIT_GENERIC
        }
    }
}

fn run_status(env_flag: Option<&str>) -> u8 {
    let (env, ctx) = match resolve_env_and_context(env_flag) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    let config = Config::from_context(ctx);
    match read_pid(&config.lock_path) {
        Some(pid) if pid_is_alive(pid) => {
            println!("{env}: running (pid {pid}, socket {})", config.socket_path.display());
            EXIT_OK
        }
        Some(pid) => {
            println!("{env}: stale lock file (pid {pid} is dead)");
            EXIT_GENERIC
        }
        None => {
            println!("{env}: not running");
            EXIT_GENERIC
        }
    }
}

fn run_init(env_flag: Option<&str>, force: bool) -> u8 {
    let (env, ctx) = match resolve_env_and_context(env_flag) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    let config = Config::from_context(ctx);

    if force {
        for path in [&config.lock_path, &config.version_path, config.ctx.endpoint_file()] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    eprintln!("failed to remove {}: {e}", path.display());
                    return EXIT_GENERIC;
                }
            }
        }
    }

    if let Err(e) = std::fs::create_dir_all(config.ctx.data_dir())
        .and_then(|_| std::fs::create_dir_all(config.ctx.log_dir()))
        .and_then(|_| std::fs::create_dir_all(&config.connectors_path))
        .and_then(|_| std::fs::create_dir_all(config.ctx.endpoint_file().parent().unwrap_or(Path::new("."))))
    {
        eprintln!("failed to initialize {env} layout: {e}");
        return EXIT_GENERIC;
    }

    println!("initialized {env} layout under {}", config.ctx.data_dir().display());
    EXIT_OK
}

fn resolve_env_and_context(
    env_flag: Option<&str>,
) -> Result<(EnvName, assistantd_core::EnvironmentContext), u8> {
    let env = assistantd_daemon::env::resolve_env(env_flag).map_err(|e| {
        eprintln!("invalid environment: {e}");
        EXIT_ENV_INVALID
    })?;
    let ctx = assistantd_daemon::env::build_context(env).map_err(|e| {
        eprintln!("failed to resolve paths: {e}");
        EXIT_GENERIC
    })?;
    Ok((env, ctx))
}

fn read_pid(lock_path: &Path) -> Option<i32> {
    std::fs::read_to_string(lock_path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn pid_is_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: i32) -> bool {
    false
}

#[cfg(unix)]
fn signal_terminate(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
fn signal_terminate(_pid: i32) -> bool {
    false
}

#[cfg(unix)]
fn current_uid() -> Option<u32> {
    Some(nix::unistd::Uid::current().as_raw())
}

#[cfg(not(unix))]
fn current_uid() -> Option<u32> {
    None
}

fn supervisor_tuning() -> SupervisorTuning {
    SupervisorTuning {
        heartbeat_deadline: assistantd_daemon::env::heartbeat_deadline(),
        start_deadline: assistantd_daemon::env::start_deadline(),
        backoff_base: assistantd_daemon::env::backoff_base(),
        backoff_cap: assistantd_daemon::env::backoff_cap(),
        backoff_window: assistantd_daemon::env::backoff_window(),
        stable_runtime: assistantd_daemon::env::stable_runtime(),
        max_restarts: assistantd_daemon::env::max_restarts(),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let term = signal(SignalKind::terminate());
    let int = signal(SignalKind::interrupt());
    match (term, int) {
        (Ok(mut term), Ok(mut int)) => {
            tokio::select! {
                _ = term.recv() => {}
                _ = int.recv() => {}
            }
        }
        _ => {
            // Signal handlers failed to install; fall back to Ctrl+C only
            // rather than leaving the daemon with no shutdown path at all.
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
