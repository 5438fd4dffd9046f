//! Plain-text rendering of streamed answers.

use std::io::{self, Write};

use chat_session::{ChatView, CitedSection, Message};

/// Writes one AI message to a terminal as it grows.
///
/// Content is append-only while streaming, so only the unseen suffix is written
/// on each call.
#[derive(Debug, Default)]
pub struct AnswerPrinter {
    message_id: Option<String>,
    printed: usize,
    settled: bool,
}

impl AnswerPrinter {
    pub fn track(&mut self, message_id: impl Into<String>) {
        self.message_id = Some(message_id.into());
        self.printed = 0;
        self.settled = false;
    }

    /// Follow a new message after a supersede or retry.
    ///
    /// The previous message is rendered once more so a settled partial answer
    /// is finished, and an unfinished line is terminated before the next one.
    pub fn retarget<W: Write>(
        &mut self,
        view: &ChatView,
        message_id: impl Into<String>,
        out: &mut W,
    ) -> io::Result<()> {
        self.render(view, out)?;
        self.abandon(out)?;
        self.track(message_id);
        Ok(())
    }

    /// Stop following the current message, ending its line if one is open.
    pub fn abandon<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.printed > 0 && !self.settled {
            writeln!(out)?;
            out.flush()?;
        }
        self.message_id = None;
        self.printed = 0;
        self.settled = false;
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.message_id.is_none() || self.settled
    }

    pub fn render<W: Write>(&mut self, view: &ChatView, out: &mut W) -> io::Result<()> {
        if self.settled {
            return Ok(());
        }
        let Some(message) = self
            .message_id
            .as_deref()
            .and_then(|message_id| view.message(message_id))
        else {
            return Ok(());
        };

        if message.is_error {
            if self.printed > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", format_error(message))?;
            self.settled = true;
            return out.flush();
        }

        if let Some(delta) = message.content.get(self.printed..) {
            out.write_all(delta.as_bytes())?;
            self.printed = message.content.len();
        }

        if !message.is_streaming {
            writeln!(out)?;
            if !message.cited_sections.is_empty() {
                writeln!(out)?;
                out.write_all(format_citations(&message.cited_sections).as_bytes())?;
            }
            self.settled = true;
        }

        out.flush()
    }
}

pub fn format_error(message: &Message) -> String {
    if message.can_retry() {
        format!("[error] {} (type /retry to ask again)", message.content)
    } else {
        format!("[error] {}", message.content)
    }
}

pub fn format_citations(sections: &[CitedSection]) -> String {
    let mut rendered = String::from("Sources:\n");

    for (index, section) in sections.iter().enumerate() {
        rendered.push_str(&format!("  [{}] {}", index + 1, section.title));
        if let Some(section_title) = section.section_title.as_deref() {
            rendered.push_str(&format!(" / {section_title}"));
        }
        if !section.pages.is_empty() {
            let pages: Vec<String> = section.pages.iter().map(ToString::to_string).collect();
            rendered.push_str(&format!(" (p. {})", pages.join(", ")));
        }
        rendered.push('\n');
        rendered.push_str(&format!("      {}\n", section.preview.trim()));
        if let Some(source_url) = section.source_url.as_deref() {
            rendered.push_str(&format!("      {source_url}\n"));
        }
    }

    rendered
}
