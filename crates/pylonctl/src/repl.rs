//! REPL - local test loop for the reply pipeline

use anyhow::Result;
use pylon_common::{PylonSettings, SupportPipeline};
use std::io::{self, BufRead, Write};

use crate::commands;

/// Conversation id used when none is entered
pub const DUMMY_CONVERSATION_ID: &str = "dummy_convo_id";

const SEPARATOR: &str = "----------------------------------------";

pub fn run(settings: &PylonSettings, offline: bool) -> Result<()> {
    println!("Bubbles AI Reply System - Local Test Mode\n");
    let pipeline = commands::build_pipeline(settings, offline)?;

    let stdin = io::stdin();
    run_loop(&pipeline, &mut stdin.lock(), &mut io::stdout())
}

fn run_loop(pipeline: &SupportPipeline, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    loop {
        let Some(query) = prompt(input, out, "Enter a customer query (or 'quit' to exit): ")? else {
            break;
        };
        if is_quit(&query) {
            break;
        }

        let conversation_id = prompt(input, out, "Enter a conversation ID (or leave blank for dummy): ")?
            .unwrap_or_default();
        let conversation_id = conversation_id_or_dummy(&conversation_id);

        match pipeline.handle(&query, conversation_id) {
            Ok(handled) => {
                writeln!(out, "\nIntent classified: {}", handled.intent)?;
                writeln!(out, "Generated response:\n{}\n", handled.response)?;
            }
            Err(e) => writeln!(out, "\nError: {}\n", e)?,
        }
        writeln!(out, "{}", SEPARATOR)?;
    }

    Ok(())
}

/// Print the prompt and read one line; None at end of input
fn prompt(input: &mut impl BufRead, out: &mut impl Write, text: &str) -> Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

fn is_quit(query: &str) -> bool {
    query.trim().eq_ignore_ascii_case("quit")
}

fn conversation_id_or_dummy(entered: &str) -> &str {
    if entered.is_empty() {
        DUMMY_CONVERSATION_ID
    } else {
        entered
    }
}
