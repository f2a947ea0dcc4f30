// src/pipeline/answer.rs

//! Answering free-text questions about rivers.
//!
//! An external [`QueryInterpreter`] classifies the message; this module
//! only routes its verdict to storage and formats the reply.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::RiverRecord;
use crate::storage::RiverRepository;

const RIVERS_UNAVAILABLE: &str = "Sorry, I couldn't fetch the list of rivers right now.";
const NOT_UNDERSTOOD: &str =
    "Sorry, I'm having trouble understanding right now. Please try again later or use /help.";
const RIVER_UNAVAILABLE: &str = "Sorry, I couldn't fetch the data for that river right now.";

/// What the user wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Intent {
    #[serde(rename = "GetRiverDataByName")]
    FetchRiverData,
    #[serde(rename = "GeneralQuery")]
    GeneralReply,
}

/// Interpreter verdict for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub intent: Intent,
    /// Canonical river name, if one was recognized
    pub river: Option<String>,
    /// Reply text in the user's language
    pub message: String,
}

#[derive(Deserialize)]
struct InterpreterReply {
    command_name: Intent,
    #[serde(default)]
    serbian_river_name: String,
    #[serde(default)]
    user_message: String,
}

impl Interpretation {
    /// Parse the interpreter's JSON reply.
    pub fn from_json(json: &str) -> Result<Self> {
        let reply: InterpreterReply = serde_json::from_str(json)
            .map_err(|e| AppError::interpreter(format!("malformed reply: {e}")))?;
        let river = reply.serbian_river_name.trim();
        Ok(Self {
            intent: reply.command_name,
            river: (!river.is_empty()).then(|| river.to_string()),
            message: reply.user_message,
        })
    }
}

/// Natural-language classifier behind the chat front-end.
#[async_trait]
pub trait QueryInterpreter: Send + Sync {
    /// Classify `message`, given the rivers storage knows about.
    async fn interpret(&self, message: &str, known_rivers: &[String]) -> Result<Interpretation>;
}

/// Reply to a free-text query.
///
/// Never fails: every error is logged and turned into a short apology.
pub async fn answer_query(
    repository: &dyn RiverRepository,
    interpreter: &dyn QueryInterpreter,
    query: &str,
) -> String {
    log::info!("Interpreting query: {query}");

    let rivers = match repository.get_unique_rivers().await {
        Ok(rivers) => rivers,
        Err(e) => {
            log::error!("Failed to load river list: {e}");
            return RIVERS_UNAVAILABLE.to_string();
        }
    };

    let interpretation = match interpreter.interpret(query, &rivers).await {
        Ok(interpretation) => interpretation,
        Err(e) => {
            log::error!("Interpreter failed: {e}");
            return NOT_UNDERSTOOD.to_string();
        }
    };
    log::debug!("Interpretation: {interpretation:?}");

    let river = match (interpretation.intent, interpretation.river) {
        (Intent::FetchRiverData, Some(river)) => river,
        _ => return interpretation.message,
    };

    let records = match repository.get_by_river_name(&river).await {
        Ok(records) => records,
        Err(e) => {
            log::error!("Failed to load data for {river}: {e}");
            return RIVER_UNAVAILABLE.to_string();
        }
    };

    let body = if records.is_empty() {
        format!("However, I couldn't find any information for river '{river}'. Use /rivers to see available ones.")
    } else {
        format_river_report(&records)
    };

    if interpretation.message.is_empty() {
        body
    } else {
        format!("{}\n\n{}", interpretation.message, body)
    }
}

/// Multi-station report for one river.
pub fn format_river_report(records: &[RiverRecord]) -> String {
    let Some(first) = records.first() else {
        return "No information available for this river.".to_string();
    };

    let stations: Vec<String> = records.iter().map(RiverRecord::describe).collect();
    format!("Information for river {}:\n\n{}", first.river, stations.join("\n\n"))
}
