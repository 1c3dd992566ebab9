use flama_core::Department;
use flama_knowledge::{AttendantConfig, SupportStore};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::warn;

/// Substrings (lowercased) that move a message into the escalation path.
const TRANSFER_TRIGGERS: [&str; 8] = [
    "humano",
    "atendente",
    "pessoa",
    "falar com",
    "whatsapp",
    "atendimento",
    "urgente",
    "ajuda",
];

/// Name shown when no attendant is configured for the department or the
/// general fallback.
pub const FALLBACK_ATTENDANT: &str = "Secretaria Flama";

/// Whether a user message asks for a human, by case-insensitive substring.
pub fn wants_human(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TRANSFER_TRIGGERS.iter().any(|t| lowered.contains(t))
}

/// Strip formatting from a phone number and qualify it with the Brazilian
/// country code when it is a bare local number.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return digits;
    }
    if digits.len() <= 11 {
        format!("55{digits}")
    } else {
        digits
    }
}

/// WhatsApp deep link carrying the attendant greeting and the user's last
/// question.
pub fn handoff_link(attendant_name: &str, phone: &str, query: &str) -> String {
    let message = format!(
        "Olá {attendant_name}, estou vindo da Central Flama e preciso de ajuda com: \"{query}\""
    );
    format!(
        "https://wa.me/{}?text={}",
        normalize_phone(phone),
        utf8_percent_encode(&message, NON_ALPHANUMERIC)
    )
}

/// Pick the attendant for a department: exact match first, then the
/// general desk, then the named fallback with no phone (chat-only
/// handoff).
pub async fn resolve_attendant(
    store: &dyn SupportStore,
    department: Option<Department>,
) -> AttendantConfig {
    let attendants = match store.list_attendants().await {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "Attendant lookup failed, using fallback");
            Vec::new()
        }
    };

    let department = department.unwrap_or(Department::General);
    attendants
        .iter()
        .find(|a| a.department == department)
        .or_else(|| attendants.iter().find(|a| a.department == Department::General))
        .cloned()
        .unwrap_or(AttendantConfig {
            department,
            name: FALLBACK_ATTENDANT.to_string(),
            phone: String::new(),
        })
}

/// Side-effect seam for opening the WhatsApp window. The orchestrator only
/// builds the URL; the surface decides how to open it.
pub trait HandoffOpener: Send + Sync {
    fn open(&self, url: &str);
}
