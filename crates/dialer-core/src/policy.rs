//! Outbound conversation policy (C9): a per-call state machine that decides
//! what to say next and classifies the patient's reply.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundState {
    Introduction,
    IdentityVerification,
    PurposeStatement,
    MainDialog,
    AppointmentOffer,
    Confirmation,
    Farewell,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundOutcome {
    AppointmentConfirmed,
    AppointmentRescheduled,
    InformationDelivered,
    CallbackRequested,
    PatientDeclined,
    WrongPerson,
    VoicemailLeft,
    ConversationFailed,
    PatientHungUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Affirm,
    Deny,
    Reschedule,
    CallbackRequest,
    Goodbye,
    Unclassified,
}

/// Keyword lists are configuration, not code.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub affirm: Vec<String>,
    pub deny: Vec<String>,
    pub reschedule: Vec<String>,
    pub callback_request: Vec<String>,
    pub goodbye: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            affirm: ["ja", "okay", "ok", "gut", "richtig", "genau", "passt", "stimmt", "korrekt", "gerne", "einverstanden", "bestätigt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            deny: ["nein", "nicht", "falsch", "absagen", "stornieren", "geht nicht", "kann nicht", "leider nicht"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reschedule: ["verschieben", "anderen termin", "umbuchen", "ändern", "später", "früher", "anderer tag", "andere zeit"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            callback_request: ["zurückrufen", "später anrufen", "gerade schlecht", "kann nicht sprechen", "im meeting", "beschäftigt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            goodbye: ["auf wiederhören", "auf wiedersehen", "tschüss", "tschüs", "ciao", "bis dann"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassifierConfig {
    /// Case-insensitive substring match, first matched class wins in the
    /// order Goodbye, CallbackRequest, Reschedule, Deny, Affirm -- mirroring
    /// `process_input`'s dispatch order (goodbye/callback checked globally
    /// before any state-specific handling).
    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let any_match = |list: &[String]| list.iter().any(|kw| lower.contains(kw.as_str()));

        if any_match(&self.goodbye) {
            Classification::Goodbye
        } else if any_match(&self.callback_request) {
            Classification::CallbackRequest
        } else if any_match(&self.reschedule) {
            Classification::Reschedule
        } else if any_match(&self.deny) {
            Classification::Deny
        } else if any_match(&self.affirm) {
            Classification::Affirm
        } else {
            Classification::Unclassified
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundTemplates {
    pub introduction: String,
    pub identity_verification: String,
    pub purpose_statement: String,
    pub appointment_offer: String,
    pub confirmation: String,
    pub farewell: String,
    pub alternative_slots: String,
}

impl Default for OutboundTemplates {
    fn default() -> Self {
        Self {
            introduction: "Guten Tag, hier spricht die Praxisassistentin von {practice}. Spreche ich mit {patient_name}?".to_string(),
            identity_verification: "Könnten Sie mir zur Sicherheit Ihr Geburtsdatum bestätigen?".to_string(),
            purpose_statement: "Ich rufe an wegen Ihres Termins am {appointment_date} um {appointment_time} Uhr.".to_string(),
            appointment_offer: "Passt Ihnen dieser Termin, oder möchten Sie ihn verschieben?".to_string(),
            confirmation: "Sehr gut, der Termin am {appointment_date} um {appointment_time} Uhr ist bestätigt.".to_string(),
            farewell: "Vielen Dank für Ihre Zeit. Auf Wiederhören!".to_string(),
            alternative_slots: "Welcher andere Tag würde Ihnen besser passen?".to_string(),
        }
    }
}

fn fill(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[derive(Debug, Clone)]
pub struct OutboundCallContext {
    pub practice_name: String,
    pub patient_name: String,
    pub appointment_date: String,
    pub appointment_time: String,
}

pub struct PolicyResponse {
    pub message: String,
    pub should_end_call: bool,
    pub outcome: Option<OutboundOutcome>,
}

#[derive(Debug, Clone)]
pub struct OutboundPolicyConfig {
    pub classifier: ClassifierConfig,
    pub templates: OutboundTemplates,
    /// Safety cap; exceeding it ends the call as INFORMATION_DELIVERED.
    pub turn_budget: u32,
}

impl Default for OutboundPolicyConfig {
    fn default() -> Self {
        Self { classifier: ClassifierConfig::default(), templates: OutboundTemplates::default(), turn_budget: 20 }
    }
}

/// Drives one outbound call through `INTRODUCTION -> ... -> COMPLETED/FAILED`.
pub struct OutboundPolicy {
    config: OutboundPolicyConfig,
    context: OutboundCallContext,
    state: OutboundState,
    turns: u32,
}

impl OutboundPolicy {
    pub fn new(config: OutboundPolicyConfig, context: OutboundCallContext) -> Self {
        Self { config, context, state: OutboundState::Introduction, turns: 0 }
    }

    pub fn state(&self) -> OutboundState {
        self.state
    }

    fn vars(&self) -> HashMap<&str, String> {
        let mut vars = HashMap::new();
        vars.insert("practice", self.context.practice_name.clone());
        vars.insert("patient_name", self.context.patient_name.clone());
        vars.insert("appointment_date", self.context.appointment_date.clone());
        vars.insert("appointment_time", self.context.appointment_time.clone());
        vars
    }

    /// First message spoken to the patient.
    pub fn start(&mut self) -> String {
        self.state = OutboundState::Introduction;
        fill(&self.config.templates.introduction, &self.vars())
    }

    /// Advances the state machine with the patient's transcribed reply.
    pub fn process_input(&mut self, text: &str) -> PolicyResponse {
        self.turns += 1;
        if self.turns > self.config.turn_budget {
            self.state = OutboundState::Completed;
            return PolicyResponse {
                message: self.config.templates.farewell.clone(),
                should_end_call: true,
                outcome: Some(OutboundOutcome::InformationDelivered),
            };
        }

        let classification = self.config.classifier.classify(text);
        if classification == Classification::Goodbye {
            return self.end(OutboundOutcome::PatientHungUp);
        }
        if classification == Classification::CallbackRequest {
            return self.end(OutboundOutcome::CallbackRequested);
        }

        match self.state {
            OutboundState::Introduction => self.handle_introduction(classification),
            OutboundState::IdentityVerification => self.handle_identity(classification),
            OutboundState::PurposeStatement => self.handle_purpose(),
            OutboundState::MainDialog => self.handle_main_dialog(classification),
            OutboundState::AppointmentOffer => self.handle_appointment_offer(classification),
            OutboundState::Confirmation => self.handle_confirmation(classification),
            OutboundState::Farewell | OutboundState::Completed => self.end(OutboundOutcome::InformationDelivered),
            OutboundState::Failed => self.end(OutboundOutcome::ConversationFailed),
        }
    }

    fn handle_introduction(&mut self, classification: Classification) -> PolicyResponse {
        if classification == Classification::Deny {
            return self.end(OutboundOutcome::WrongPerson);
        }
        self.state = OutboundState::IdentityVerification;
        PolicyResponse { message: fill(&self.config.templates.identity_verification, &self.vars()), should_end_call: false, outcome: None }
    }

    fn handle_identity(&mut self, classification: Classification) -> PolicyResponse {
        if classification == Classification::Deny {
            return self.end(OutboundOutcome::WrongPerson);
        }
        self.state = OutboundState::PurposeStatement;
        PolicyResponse { message: fill(&self.config.templates.purpose_statement, &self.vars()), should_end_call: false, outcome: None }
    }

    fn handle_purpose(&mut self) -> PolicyResponse {
        self.state = OutboundState::MainDialog;
        PolicyResponse { message: fill(&self.config.templates.appointment_offer, &self.vars()), should_end_call: false, outcome: None }
    }

    fn handle_main_dialog(&mut self, classification: Classification) -> PolicyResponse {
        match classification {
            Classification::Affirm => {
                self.state = OutboundState::AppointmentOffer;
                PolicyResponse { message: fill(&self.config.templates.appointment_offer, &self.vars()), should_end_call: false, outcome: None }
            }
            Classification::Reschedule => {
                self.state = OutboundState::AppointmentOffer;
                PolicyResponse { message: self.config.templates.alternative_slots.clone(), should_end_call: false, outcome: None }
            }
            _ => self.end(OutboundOutcome::InformationDelivered),
        }
    }

    fn handle_appointment_offer(&mut self, classification: Classification) -> PolicyResponse {
        let outcome = match classification {
            Classification::Reschedule => OutboundOutcome::AppointmentRescheduled,
            Classification::Affirm => OutboundOutcome::AppointmentConfirmed,
            Classification::Deny => return self.end(OutboundOutcome::PatientDeclined),
            Classification::Unclassified => {
                return PolicyResponse {
                    message: self.config.templates.alternative_slots.clone(),
                    should_end_call: false,
                    outcome: None,
                }
            }
            _ => OutboundOutcome::InformationDelivered,
        };
        self.state = OutboundState::Confirmation;
        PolicyResponse { message: fill(&self.config.templates.confirmation, &self.vars()), should_end_call: false, outcome: Some(outcome) }
    }

    fn handle_confirmation(&mut self, _classification: Classification) -> PolicyResponse {
        self.end(OutboundOutcome::AppointmentConfirmed)
    }

    fn end(&mut self, outcome: OutboundOutcome) -> PolicyResponse {
        self.state = OutboundState::Completed;
        PolicyResponse { message: self.config.templates.farewell.clone(), should_end_call: true, outcome: Some(outcome) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> OutboundCallContext {
        OutboundCallContext {
            practice_name: "Praxis Schmidt".to_string(),
            patient_name: "Max Mustermann".to_string(),
            appointment_date: "Montag".to_string(),
            appointment_time: "14:30".to_string(),
        }
    }

    #[test]
    fn full_happy_path_confirms_appointment() {
        let mut policy = OutboundPolicy::new(OutboundPolicyConfig::default(), context());
        let greeting = policy.start();
        assert!(greeting.contains("Max Mustermann"));

        let r1 = policy.process_input("Ja, das bin ich.");
        assert_eq!(policy.state(), OutboundState::PurposeStatement);
        assert!(!r1.should_end_call);

        let r2 = policy.process_input("Ja korrekt.");
        assert_eq!(policy.state(), OutboundState::MainDialog);
        let _ = r2;

        let r3 = policy.process_input("Ja, das passt.");
        assert_eq!(policy.state(), OutboundState::AppointmentOffer);
        let _ = r3;

        let r4 = policy.process_input("Ja, passt mir.");
        assert_eq!(r4.outcome, Some(OutboundOutcome::AppointmentConfirmed));
        assert_eq!(policy.state(), OutboundState::Confirmation);

        let r5 = policy.process_input("Danke, auf Wiederhören.");
        assert!(r5.should_end_call);
        assert_eq!(policy.state(), OutboundState::Completed);
    }

    #[test]
    fn goodbye_keyword_ends_call_from_any_state() {
        let mut policy = OutboundPolicy::new(OutboundPolicyConfig::default(), context());
        policy.start();
        let response = policy.process_input("Tschüss!");
        assert!(response.should_end_call);
        assert_eq!(response.outcome, Some(OutboundOutcome::PatientHungUp));
    }

    #[test]
    fn exceeding_turn_budget_ends_with_information_delivered() {
        let mut config = OutboundPolicyConfig::default();
        config.turn_budget = 2;
        let mut policy = OutboundPolicy::new(config, context());
        policy.start();
        policy.process_input("ja");
        policy.process_input("ja");
        let response = policy.process_input("ja");
        assert_eq!(response.outcome, Some(OutboundOutcome::InformationDelivered));
    }

    #[test]
    fn classifier_is_case_insensitive_and_first_match_wins() {
        let classifier = ClassifierConfig::default();
        assert_eq!(classifier.classify("JA, passt super"), Classification::Affirm);
        assert_eq!(classifier.classify("Auf Wiederhören, tschüss"), Classification::Goodbye);
    }
}
