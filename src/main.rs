use std::io::{self, stdout, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result as AnyhowResult};
use blockshell::app::App;
use blockshell::config::Config;
use blockshell::config_io::{self, DirectoryContext};
use blockshell::model::event::EngineEvent;
use blockshell::services::clipboard::Clipboard;
use blockshell::services::history::History;
use blockshell::services::ipc::IpcServer;
use blockshell::services::terminal_modes::{self, TerminalModes};
use blockshell::services::{banner, signal_handler, tracing_setup};
use clap::Parser;
use crossterm::event::{
    poll as event_poll, read as event_read, Event as CrosstermEvent, KeyEventKind,
};
use ratatui::Terminal;

/// A block-based terminal shell front-end
#[derive(Parser, Debug)]
#[command(name = "blockshell")]
#[command(about = "A terminal shell front-end that renders each command as a block", long_about = None)]
#[command(version)]
struct Args {
    /// `version` prints the build version and exits.
    #[arg(value_name = "COMMAND")]
    command: Option<String>,

    /// Path to the log file for diagnostics (default: system temp dir)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

struct SetupState {
    config: Config,
    dir_context: DirectoryContext,
    terminal: Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>,
    terminal_size: (u16, u16),
    terminal_modes: TerminalModes,
}

fn initialize_app(args: &Args) -> AnyhowResult<SetupState> {
    let log_file = args.log_file.clone().unwrap_or_else(config_io::default_log_path);
    if !tracing_setup::init_global(&log_file) {
        eprintln!("Warning: could not open log file {}", log_file.display());
    }
    tracing::info!("blockshell starting");

    signal_handler::install_signal_handlers();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        terminal_modes::emergency_cleanup();
        original_hook(panic);
    }));

    let dir_context = DirectoryContext::from_system()?;
    let config = if let Some(config_path) = &args.config {
        match Config::load_from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: failed to load config from {}: {}", config_path.display(), e);
                anyhow::bail!(io::Error::new(io::ErrorKind::InvalidData, e.to_string()));
            }
        }
    } else {
        match Config::load_or_create(&dir_context) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: failed to load config: {:#}", e);
                anyhow::bail!(io::Error::new(io::ErrorKind::InvalidData, e.to_string()));
            }
        }
    };

    let terminal_modes = TerminalModes::enable()?;

    let backend = ratatui::backend::CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let size = terminal.size()?;
    tracing::info!("terminal size: {}x{}", size.width, size.height);

    Ok(SetupState {
        config,
        dir_context,
        terminal,
        terminal_size: (size.width, size.height),
        terminal_modes,
    })
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    if args.command.as_deref() == Some("version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if let Some(other) = &args.command {
        eprintln!("Unknown command: {}", other);
        std::process::exit(2);
    }

    let SetupState {
        config,
        dir_context,
        mut terminal,
        terminal_size,
        mut terminal_modes,
    } = initialize_app(&args).context("failed to initialize application")?;

    let (events_tx, events_rx) = mpsc::channel::<EngineEvent>();
    let cwd = Arc::new(Mutex::new(
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    ));

    let mut ipc = IpcServer::spawn(events_tx.clone(), Arc::clone(&cwd))
        .context("failed to start the IPC endpoint")?;

    banner::spawn(events_tx.clone(), &config);

    let history = History::new(
        dir_context.history_file(),
        config.shell.max_history_length as usize,
    );

    let (width, height) = terminal_size;
    let mut app = App::new(
        config,
        history,
        Clipboard::new(),
        ipc.endpoint.clone(),
        cwd,
        events_tx,
        width,
        height,
    );

    let result = run_event_loop(&mut app, &mut terminal, &events_rx);

    // Shutdown: every tracked child is terminated before the process
    // exits, then the IPC listener drains and the terminal is restored.
    app.shutdown_children();
    ipc.shutdown();
    terminal_modes.undo();

    result.context("event loop returned an error")?;

    let code = app.exit_code();
    tracing::info!("exiting with code {}", code);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn run_event_loop(
    app: &mut App,
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>,
    events_rx: &mpsc::Receiver<EngineEvent>,
) -> AnyhowResult<()> {
    const FRAME_DURATION: Duration = Duration::from_millis(16);
    const IDLE_POLL: Duration = Duration::from_millis(50);

    let mut last_render = Instant::now();
    let mut needs_render = true;

    loop {
        // Apply worker messages (PTY chunks, IPC, banner) first; each
        // message is fully processed before the next is dequeued.
        while let Ok(event) = events_rx.try_recv() {
            app.handle_engine_event(event);
            needs_render = true;
        }

        if signal_handler::shutdown_requested() && !app.should_quit() {
            tracing::info!("termination signal received");
            app.request_exit(130);
        }

        if app.take_full_redraw_request() {
            terminal.clear()?;
            needs_render = true;
        }

        if app.should_quit() {
            break;
        }

        if needs_render && last_render.elapsed() >= FRAME_DURATION {
            terminal.draw(|frame| app.render(frame))?;
            let osc = app.osc_frame_output();
            if !osc.is_empty() {
                let mut out = stdout();
                let _ = out.write_all(osc.as_bytes());
                let _ = out.flush();
            }
            last_render = Instant::now();
            needs_render = false;
        }

        let timeout = if needs_render {
            FRAME_DURATION.saturating_sub(last_render.elapsed())
        } else {
            IDLE_POLL
        };

        if !event_poll(timeout)? {
            // Idle tick: keeps spinners and elapsed times moving.
            if app.tick() {
                needs_render = true;
            }
            continue;
        }

        match event_read()? {
            CrosstermEvent::Key(key_event) => {
                if key_event.kind == KeyEventKind::Press {
                    app.handle_key(key_event);
                    needs_render = true;
                }
            }
            CrosstermEvent::Mouse(mouse_event) => {
                if app.handle_mouse(mouse_event) {
                    needs_render = true;
                }
            }
            CrosstermEvent::Resize(w, h) => {
                app.resize(w, h);
                needs_render = true;
            }
            CrosstermEvent::Paste(text) => {
                app.handle_paste(text);
                needs_render = true;
            }
            _ => {}
        }
    }

    Ok(())
}
