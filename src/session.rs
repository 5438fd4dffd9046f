//! Drives a [`ChatView`] from the terminal.
//!
//! Both entry points own the view on the calling thread. Provider events are
//! applied through [`StreamController::flush_pending_events`] and printed with
//! an [`AnswerPrinter`] between input lines.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use answer_provider::AnswerProvider;
use chat_session::{parse_slash_command, ChatView, Message, SlashCommand, StreamController};
use serde_json::Value;
use tracing::debug;

use crate::printer::AnswerPrinter;

const EVENT_WAIT: Duration = Duration::from_millis(50);

const INTERRUPTED_TEXT: &str = "The answer was interrupted when you left this chat.";

const HELP_TEXT: &str = "\
Commands:
  /help          show this help
  /chat [ID]     switch to chat ID, or start a new chat
  /retry         ask the last failed question again
  /cancel        stop the answer being streamed
  /quit, /exit   leave";

/// Search scope applied to every question of a session.
#[derive(Debug, Clone, Default)]
pub struct AskScope {
    pub indices: Vec<String>,
    pub filter_dimensions: Value,
}

/// Ask one question and print the answer as it streams.
///
/// Returns the settled AI message.
pub fn run_ask<W: Write>(
    provider: Arc<dyn AnswerProvider>,
    chat_id: &str,
    query: &str,
    scope: &AskScope,
    out: &mut W,
) -> Result<Message> {
    let view = Arc::new(Mutex::new(ChatView::new(chat_id)));
    let controller = StreamController::new(Arc::clone(&view), provider);
    let mut host = Arc::clone(&controller);
    let mut printer = AnswerPrinter::default();

    let message_id = {
        let mut view = lock_unpoisoned(&view);
        view.submit(
            query,
            scope.indices.clone(),
            scope.filter_dimensions.clone(),
            &mut host,
        );
        latest_ai_message_id(&view)
    }
    .context("question was empty")?;
    printer.track(message_id.clone());

    pump_until_idle(&controller, &mut printer, out)?;

    let view = lock_unpoisoned(&view);
    view.message(&message_id)
        .cloned()
        .context("answer message disappeared from the chat")
}

/// Interactive loop over `input`, one question or command per line.
///
/// Input is read on a helper thread so answers keep printing while the user
/// types. At end of input the active answer is allowed to finish.
pub fn run_repl<R, W>(
    provider: Arc<dyn AnswerProvider>,
    chat_id: &str,
    scope: &AskScope,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let view = Arc::new(Mutex::new(ChatView::new(chat_id)));
    let controller = StreamController::new(Arc::clone(&view), provider);
    let mut host = Arc::clone(&controller);
    let mut printer = AnswerPrinter::default();
    // Chats left with `/chat`, restored when switched back to.
    let mut histories: HashMap<String, Vec<Message>> = HashMap::new();
    let lines = spawn_line_reader(input)?;

    writeln!(out, "Chat {chat_id}. Type /help for commands.")?;
    out.flush()?;

    loop {
        pump_once(&controller, &mut printer, out)?;

        let line = match lines.recv_timeout(EVENT_WAIT) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("input closed");
                pump_until_idle(&controller, &mut printer, out)?;
                return Ok(());
            }
        };

        let Some(command) = parse_slash_command(&line) else {
            if line.trim().is_empty() {
                continue;
            }
            let mut view = lock_unpoisoned(&view);
            view.submit(
                &line,
                scope.indices.clone(),
                scope.filter_dimensions.clone(),
                &mut host,
            );
            if let Some(message_id) = latest_ai_message_id(&view) {
                printer.retarget(&view, message_id, out)?;
            }
            continue;
        };

        match command {
            SlashCommand::Help => writeln!(out, "{HELP_TEXT}")?,
            SlashCommand::Chat(target) => {
                let target = target.unwrap_or_else(new_chat_id);
                let mut view = lock_unpoisoned(&view);
                if target == view.chat_id() {
                    writeln!(out, "Already in chat {target}.")?;
                } else {
                    printer.abandon(out)?;
                    histories.insert(view.chat_id().to_string(), history_snapshot(&view));
                    let history = histories.remove(&target).unwrap_or_default();
                    view.switch_chat(target.clone(), history, &mut host);
                    writeln!(out, "Switched to chat {target}.")?;
                }
            }
            SlashCommand::Retry => {
                let mut view = lock_unpoisoned(&view);
                if view.retry_last(&mut host) {
                    if let Some(message_id) = latest_ai_message_id(&view) {
                        printer.retarget(&view, message_id, out)?;
                    }
                } else {
                    writeln!(out, "Nothing to retry.")?;
                }
            }
            SlashCommand::Cancel => {
                if !lock_unpoisoned(&view).cancel(&mut host) {
                    writeln!(out, "Nothing to cancel.")?;
                }
            }
            SlashCommand::Quit => {
                lock_unpoisoned(&view).teardown(&mut host);
                return Ok(());
            }
            SlashCommand::Unknown(name) => {
                writeln!(out, "Unknown command {name}. Type /help for commands.")?;
            }
        }
        out.flush()?;
    }
}

#[must_use]
pub fn new_chat_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn spawn_line_reader<R>(input: R) -> Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("acaceta-input".to_string())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else {
                    break;
                };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn input reader")?;
    Ok(receiver)
}

fn pump_once<W: Write>(
    controller: &Arc<StreamController>,
    printer: &mut AnswerPrinter,
    out: &mut W,
) -> Result<()> {
    controller.flush_pending_events();
    let view = lock_unpoisoned(controller.view());
    printer.render(&view, out)?;
    Ok(())
}

fn pump_until_idle<W: Write>(
    controller: &Arc<StreamController>,
    printer: &mut AnswerPrinter,
    out: &mut W,
) -> Result<()> {
    loop {
        pump_once(controller, printer, out)?;
        if !lock_unpoisoned(controller.view()).is_busy() {
            return Ok(());
        }
        controller.wait_for_events(EVENT_WAIT);
    }
}

/// Messages of the visible chat as they should be kept once it is left.
///
/// The active stream is about to be aborted, so its placeholder is settled.
/// A placeholder that received no text becomes a retryable error.
fn history_snapshot(view: &ChatView) -> Vec<Message> {
    let exchange = view.exchange();

    view.messages
        .iter()
        .cloned()
        .map(|mut message| {
            if !message.is_streaming {
                return message;
            }
            message.is_streaming = false;

            let interrupted = exchange.filter(|exchange| exchange.ai_message_id == message.id);
            if let Some(exchange) = interrupted {
                if message.content.trim().is_empty() {
                    message.content = INTERRUPTED_TEXT.to_string();
                    message.is_error = true;
                    message.retry = Some(exchange.request.clone());
                }
            }
            message
        })
        .collect()
}

fn latest_ai_message_id(view: &ChatView) -> Option<String> {
    view.messages
        .iter()
        .rev()
        .find(|message| message.is_ai())
        .map(|message| message.id.clone())
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
