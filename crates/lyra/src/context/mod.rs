//! Context assembly for upstream completion requests
//!
//! Builds the ordered instruction list sent to the model: a synthesized
//! system directive (persona, current date and time in Brasília, behavioral
//! rules), a bounded window of prior conversation turns, and optionally a
//! web-context turn built from fresh search results.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::search::SearchResult;

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System directive
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl Role {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in the conversation sent to the model
///
/// Immutable once constructed. Ordering inside a list is significant: it
/// defines the conversational causality presented to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Who produced this message
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Instruction {
    /// Create a new instruction
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Brasília wall clock (UTC-3, no DST since 2019)
pub fn now_brasilia() -> DateTime<FixedOffset> {
    let offset = FixedOffset::west_opt(3 * 3600).expect("static offset is in range");
    Utc::now().with_timezone(&offset)
}

const WEEKDAYS: [&str; 7] = [
    "segunda-feira",
    "terça-feira",
    "quarta-feira",
    "quinta-feira",
    "sexta-feira",
    "sábado",
    "domingo",
];

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// Format a date as Brazilian Portuguese long form
///
/// Example: "quarta-feira, 6 de agosto de 2026"
pub fn format_date_pt_br(now: DateTime<FixedOffset>) -> String {
    let weekday = WEEKDAYS[now.weekday().num_days_from_monday() as usize];
    let month = MONTHS[now.month0() as usize];
    format!("{weekday}, {} de {month} de {}", now.day(), now.year())
}

/// Format a time as "HH:MM:SS"
pub fn format_time_pt_br(now: DateTime<FixedOffset>) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Build the synthesized system instruction
///
/// Carries the assistant persona, the current date and time in Brasília,
/// and the fixed behavioral directives, including how to treat freshly
/// supplied web context and how to reference sources.
pub fn system_instruction(now: DateTime<FixedOffset>) -> Instruction {
    let data_hoje = format_date_pt_br(now);
    let hora_agora = format_time_pt_br(now);
    let content = format!(
        "Você é Lyra, uma assistente de IA cordial, paciente e clara, criada pelo Mykoll, um desenvolvedor. \
         Hoje é {data_hoje} e agora são {hora_agora} no horário de Brasília. \
         Só informe a data ou a hora atual se o usuário perguntar explicitamente sobre isso. \
         Responda sempre em português correto, com ortografia e gramática perfeitas. \
         Se precisar repetir uma informação já dada, faça isso de forma gentil e acolhedora. \
         Evite soar ríspida, impaciente ou dar respostas muito curtas. \
         Quando não souber a resposta, explique educadamente e sugira formas de encontrar a informação. \
         Não invente informações e não use gírias, mantendo sempre um tom amigável e prestativo. \
         Sempre que houver mensagens com \"📡 INFORMAÇÃO ATUALIZADA DA WEB\", você DEVE usá-las como fonte principal. \
         Nunca diga que não tem acesso em tempo real. \
         IMPORTANTE: quando usar informações da web, NÃO cite \"Fonte 1\", \"Fonte 2\" na resposta. \
         Traga apenas a informação consolidada em texto corrido. As referências já serão mostradas separadamente na interface."
    );
    Instruction::new(Role::System, content)
}

/// Build the web-context instruction from search results
///
/// The directive is deliberately single-policy: answer from the supplied
/// material only, disregard prior conversation for this turn, and prefer
/// the most recent datum on conflict.
pub fn web_context_instruction(results: &[SearchResult]) -> Instruction {
    let blocks: Vec<String> = results
        .iter()
        .map(|r| format!("{}\n{}\n({})", r.title, r.snippet, r.url))
        .collect();
    let content = format!(
        "📡 INFORMAÇÃO ATUALIZADA DA WEB:\n\n{}\n\n\
         Com base SOMENTE nestas informações, responda à pergunta do usuário de forma objetiva. \
         Desconsidere o histórico da conversa nesta resposta. \
         Se houver dados conflitantes, considere apenas o mais recente. \
         Responda uma única vez, sem repetições.",
        blocks.join("\n\n")
    );
    Instruction::new(Role::User, content)
}

/// Assemble the ordered instruction list for one upstream request
///
/// The system instruction always comes first, followed by the trailing
/// `window` entries of the conversation, followed by the web-context
/// instruction when present.
pub fn assemble(
    history: &[Instruction],
    web_context: Option<Instruction>,
    window: usize,
    now: DateTime<FixedOffset>,
) -> Vec<Instruction> {
    let start = history.len().saturating_sub(window);
    let mut instructions = Vec::with_capacity(history.len() - start + 2);
    instructions.push(system_instruction(now));
    instructions.extend_from_slice(&history[start..]);
    if let Some(context) = web_context {
        instructions.push(context);
    }
    instructions
}
