//! `chatbox chat`: a line-oriented chat client.
//!
//! Replies stream in token by token. Ctrl-C or `/stop` while a reply is
//! streaming stops it and keeps what arrived.

use std::io::stdout;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::info;

use chatbox_client::{
    ChatController, ControllerOptions, Generation, GenerationEvent, GenerationOutcome,
    HttpTransport, JsonFileStore, Workspace, FAILURE_NOTICE,
};
use chatbox_config::ChatboxConfig;

use crate::terminal_output::{
    note_error, note_info, note_success, note_warn, print_transcript, prompt_marker,
    render_conversation_list, reply_marker, stream_write,
};

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
/new          start a new chat
/list         list chats
/open <n>     switch to chat number n
/rename <t>   rename the current chat
/delete       delete the current chat
/regen        ask again for the last prompt
/theme        toggle light/dark theme
/stop         stop the reply being streamed
/quit         leave";

pub async fn run(config: &ChatboxConfig) -> Result<()> {
    let workspace = match &config.client.state_path {
        Some(path) => Workspace::open(JsonFileStore::new(path))
            .with_context(|| format!("Failed to open chat state at {}", path.display()))?,
        None => Workspace::in_memory(),
    };

    let transport = Arc::new(HttpTransport::new(config.client.endpoint.clone()));
    let ctrl = ChatController::new(
        Arc::new(workspace),
        transport,
        ControllerOptions {
            model: config.client.model.clone(),
            title_max_chars: config.client.title_max_chars,
        },
    );

    info!(endpoint = %config.client.endpoint, model = %config.client.model, "Chat client ready");
    note_info(&format!(
        "Talking to {} as {}. Type /help for commands.",
        config.client.endpoint, config.client.model
    ));
    if let Some(active) = ctrl.handle().active() {
        print_transcript(&active);
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stream_write(&mut stdout(), &prompt_marker())?;
        let Some(line) = input.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        match command {
            "" => {}
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/new" => {
                ctrl.handle().new_chat()?;
                note_success("Started a new chat");
            }
            "/list" => {
                let ws = ctrl.handle();
                print!(
                    "{}",
                    render_conversation_list(&ws.conversations(), ws.active_id())
                );
            }
            "/open" => open_chat(&ctrl, arg)?,
            "/rename" if !arg.is_empty() => {
                if let Some(id) = ctrl.handle().active_id() {
                    ctrl.handle().rename(id, arg)?;
                    note_success(&format!("Renamed to {arg}"));
                }
            }
            "/delete" => {
                if let Some(id) = ctrl.handle().active_id() {
                    ctrl.handle().delete(id)?;
                    note_success("Chat deleted");
                }
                if let Some(active) = ctrl.handle().active() {
                    print_transcript(&active);
                }
            }
            "/theme" => {
                let theme = ctrl.handle().toggle_theme()?;
                note_info(&format!("Theme is now {theme:?}"));
            }
            "/stop" => note_warn("Nothing is streaming"),
            "/regen" => match ctrl.begin_regenerate() {
                Some(generation) => stream_reply(&ctrl, generation, &mut input).await?,
                None => note_warn("Nothing to regenerate"),
            },
            _ if command.starts_with('/') => note_warn("Unknown command, try /help"),
            _ => match ctrl.begin(line) {
                Some(generation) => stream_reply(&ctrl, generation, &mut input).await?,
                None => note_warn("A reply is still streaming"),
            },
        }
    }

    Ok(())
}

fn open_chat(ctrl: &ChatController<Workspace>, arg: &str) -> Result<()> {
    let conversations = ctrl.handle().conversations();
    let picked = arg
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| conversations.get(i));

    match picked {
        Some(conversation) => {
            ctrl.handle().select(conversation.id)?;
            print_transcript(conversation);
        }
        None => note_warn("No such chat, see /list"),
    }
    Ok(())
}

/// Print the reply as it streams, while still listening for `/stop` and Ctrl-C.
async fn stream_reply(
    ctrl: &ChatController<Workspace>,
    generation: Generation<Workspace>,
    input: &mut Input,
) -> Result<()> {
    let mut events = ctrl.subscribe();
    let mut out = stdout();
    stream_write(&mut out, &reply_marker())?;

    let mut task = tokio::spawn(generation.run());
    let mut input_open = true;
    let outcome = loop {
        tokio::select! {
            outcome = &mut task => break outcome.context("Generation task panicked")?,
            event = events.recv() => {
                if let Ok(GenerationEvent::Delta { text, .. }) = event {
                    stream_write(&mut out, &text)?;
                }
            }
            _ = tokio::signal::ctrl_c() => ctrl.stop(),
            line = input.next_line(), if input_open => match line? {
                Some(line) if line.trim() == "/stop" => ctrl.stop(),
                Some(_) => {}
                None => input_open = false,
            },
        }
    };

    // Deltas published before the task finished may still be queued.
    loop {
        match events.try_recv() {
            Ok(GenerationEvent::Delta { text, .. }) => stream_write(&mut out, &text)?,
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    println!();

    match outcome {
        GenerationOutcome::Completed => {}
        GenerationOutcome::Cancelled => note_warn("Stopped"),
        GenerationOutcome::UpstreamFailed(diagnostic) => {
            note_error(&format!("{FAILURE_NOTICE} ({diagnostic})"))
        }
        GenerationOutcome::TransportFailed(reason) => {
            note_error(&format!("{FAILURE_NOTICE} ({reason})"))
        }
    }
    Ok(())
}
