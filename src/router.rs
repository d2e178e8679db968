//! Turn-by-turn response selection for the chatbot.
//!
//! Each call walks a fixed priority ladder and stops at the first rule that
//! applies: name capture, contextual phrases, topic detection (several
//! topics, then exactly one), continuation of the last topic, and finally
//! the fallback heuristics.

use crate::config::ChatConfig;
use crate::timer::Millis;
use crate::{KnowledgeBase, TopicEntry, normalize};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

const MENU_OPTIONS: &[&str] = &["Ver horarios", "Ver tarifas", "Ver estaciones", "Ver seguridad"];
const NAME_OPTIONS: &[&str] = &["Ver horarios", "Ver tarifas", "Ver estaciones"];
const COMBINED_OPTIONS: &[&str] = &["Ver más detalles", "Otra pregunta", "Volver al inicio"];
const NAME_PLACEHOLDER: &str = "{name}";

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:me llamo|soy)\s+(\w+)").expect("valid name pattern"));

static CONTINUATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(si|ok|dale|claro|si por favor|me interesa|quiero saber)")
        .expect("valid continuation pattern")
});

static FALLBACK_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![
        FallbackRule::new(
            Fallback::Confusion,
            r"no entiendo|confuso|complicado|dificil",
            "Entiendo que puede ser confuso. Déjame ayudarte de forma más simple. ¿Qué es lo principal que te gustaría saber del Cablebús?",
            &["Cuánto cuesta", "Cuándo abre", "Dónde están las estaciones", "Hablar con alguien"],
        ),
        FallbackRule::new(
            Fallback::Urgency,
            r"urgente|rapido|necesito|ahora",
            "Entiendo que necesitas información rápida. Estos son los datos esenciales:<br><br>📍 <strong>7 estaciones</strong><br>💰 <strong>$12 MXN</strong><br>⏰ <strong>5 AM - 11 PM</strong><br>⚡ <strong>25 minutos</strong> de viaje<br><br>¿Qué más necesitas saber?",
            &["Ver mapa", "Formas de pago", "Contacto directo"],
        ),
        FallbackRule::new(
            Fallback::Employment,
            r"trabajo|empleo|vacante|contratar",
            "El proyecto Cablebús está generando <strong>más de 200 empleos directos</strong> y 500 indirectos. Para oportunidades laborales, te recomiendo:<br><br>📧 Enviar CV a: <strong>sdm.smyt@gmail.com</strong><br>📱 Seguir nuestras redes sociales<br>🌐 Visitar: chiapas.gob.mx<br><br>¿Te gustaría saber más sobre el proyecto?",
            &["Ver más información", "Ver requisitos", "Volver al inicio"],
        ),
    ]
});

const GENERIC_FALLBACK: &str = "Hmm, no estoy seguro de haber entendido bien tu pregunta. 🤔<br><br>Puedo ayudarte con información sobre:<br>• Horarios y tarifas<br>• Estaciones y rutas<br>• Seguridad<br>• Formas de pago<br>• Y mucho más<br><br>¿Sobre qué te gustaría saber?";
const GENERIC_FALLBACK_OPTIONS: &[&str] = &[
    "Ver horarios",
    "Ver tarifas",
    "Ver estaciones",
    "Ver preguntas frecuentes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the router remembers about one chat session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationState {
    history: Vec<Turn>,
    last_topic: Option<String>,
    user_name: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Topic of the last single-topic answer. Never cleared within a session.
    pub fn last_topic(&self) -> Option<&str> {
        self.last_topic.as_deref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn record(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.history.push(Turn {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    fn remember_topic(&mut self, key: &str) {
        self.last_topic = Some(key.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    Confusion,
    Urgency,
    Employment,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialOption {
    Features,
    Contact,
    Faq,
    Details,
    AnotherQuestion,
    Restart,
}

impl SpecialOption {
    fn detect(normalized: &str) -> Option<Self> {
        if normalized.contains("características") || normalized.contains("caracteristicas") {
            Some(Self::Features)
        } else if normalized.contains("contacto")
            || normalized.contains("hablar")
            || normalized.contains("requisitos")
        {
            Some(Self::Contact)
        } else if normalized.contains("preguntas frecuentes") {
            Some(Self::Faq)
        } else if normalized.contains("más detalles") || normalized.contains("mas detalles") {
            Some(Self::Details)
        } else if normalized.contains("otra pregunta") {
            Some(Self::AnotherQuestion)
        } else if normalized.contains("inicio") || normalized.contains("volver") {
            Some(Self::Restart)
        } else {
            None
        }
    }

    fn text(self) -> &'static str {
        match self {
            Self::Features => {
                "El Cablebús cuenta con:<br>• 7 estaciones modernas<br>• Cabinas para 10 personas<br>• Sistema 100% eléctrico<br>• Operación de 5 AM a 11 PM<br>• Accesibilidad universal<br>• Tecnología de última generación"
            }
            Self::Contact => {
                "Puedes contactarnos por:<br><br>📧 <strong>Email:</strong> sdm.smyt@gmail.com<br>⏰ <strong>Horario:</strong> Lun-Vie 8:00-17:00<br>📱 <strong>Facebook:</strong> @SMyTChiapas<br>📱 <strong>Instagram:</strong> @smyt_chiapas<br><br>También visita nuestra sección de <a href=\"preguntas.html\">Preguntas Frecuentes</a>"
            }
            Self::Faq => {
                "Puedes encontrar más información en nuestra sección de <a href=\"preguntas.html\">Preguntas Frecuentes</a>, donde respondemos todas tus dudas sobre el Sistema Cablebús."
            }
            Self::Details => {
                "Con gusto te doy más detalles. ¿Sobre qué tema te gustaría profundizar?"
            }
            Self::AnotherQuestion => {
                "¡Claro! Escribe tu pregunta o elige uno de estos temas:"
            }
            Self::Restart => {
                "¿En qué más puedo ayudarte? Selecciona una opción o escribe tu pregunta."
            }
        }
    }

    fn options(self) -> &'static [&'static str] {
        match self {
            Self::Features => &["Ver horarios", "Ver tarifas", "Volver al inicio"],
            Self::Contact => &["Ver horarios", "Volver al inicio"],
            Self::Faq => NAME_OPTIONS,
            Self::Details | Self::AnotherQuestion | Self::Restart => MENU_OPTIONS,
        }
    }
}

/// Which ladder rule produced a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyKind {
    NameCapture { name: String },
    Contextual { category: String },
    Combined { topics: Vec<String> },
    MultiTopic { topics: Vec<String> },
    Topic { key: String },
    Continuation { key: String },
    Special { option: SpecialOption },
    Fallback { fallback: Fallback },
}

/// A second bot message delivered some time after the main reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUp {
    pub delay_ms: Millis,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
    pub options: Vec<String>,
    pub follow_up: Option<FollowUp>,
}

impl Reply {
    fn new(kind: ReplyKind, text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            options,
            follow_up: None,
        }
    }
}

struct FallbackRule {
    fallback: Fallback,
    pattern: Regex,
    response: &'static str,
    options: &'static [&'static str],
}

impl FallbackRule {
    fn new(
        fallback: Fallback,
        pattern: &str,
        response: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            fallback,
            pattern: Regex::new(pattern).expect("valid fallback pattern"),
            response,
            options,
        }
    }
}

/// Chooses replies for a conversation. Random choices go through `R` so
/// tests can seed them.
pub struct Router<R = SmallRng> {
    rng: R,
    config: ChatConfig,
}

impl Router<SmallRng> {
    pub fn new(config: ChatConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }
}

impl<R: Rng> Router<R> {
    pub fn with_rng(config: ChatConfig, rng: R) -> Self {
        Self { rng, config }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Answers typed input, recording both sides of the turn in `state`.
    pub fn respond(&mut self, state: &mut ConversationState, input: &str) -> Reply {
        state.record(Speaker::User, input.trim());
        let reply = self.route(state, input);
        state.record(Speaker::Bot, reply.text.clone());
        reply
    }

    /// Answers a click on a quick-reply option.
    ///
    /// Labels naming a topic (or quoting its question) open that topic, a few
    /// navigation labels get canned replies, and anything else is handled as
    /// if the label had been typed.
    pub fn select_option(&mut self, state: &mut ConversationState, label: &str) -> Reply {
        state.record(Speaker::User, label.trim());
        let normalized = normalize(label);
        let reply = if normalized.is_empty() {
            self.route(state, label)
        } else if let Some(topic) = option_topic(&normalized) {
            state.remember_topic(topic.key());
            Reply::new(
                ReplyKind::Topic {
                    key: topic.key().to_string(),
                },
                topic.answer(),
                topic.option_labels(),
            )
        } else if let Some(special) = SpecialOption::detect(&normalized) {
            special_reply(state, special)
        } else {
            self.route(state, label)
        };
        state.record(Speaker::Bot, reply.text.clone());
        reply
    }

    /// Answers a quick-action button bound to a topic key. The topic's
    /// question is recorded as if the user had asked it.
    pub fn quick_action(&mut self, state: &mut ConversationState, key: &str) -> Option<Reply> {
        let topic = KnowledgeBase::topic(key)?;
        state.record(Speaker::User, topic.question());
        state.remember_topic(topic.key());
        let reply = Reply::new(
            ReplyKind::Topic {
                key: topic.key().to_string(),
            },
            topic.answer(),
            topic.option_labels(),
        );
        state.record(Speaker::Bot, reply.text.clone());
        Some(reply)
    }

    /// Simulated typing latency before a reply to typed input appears.
    pub fn typing_delay(&mut self) -> Millis {
        let min = self.config.typing_delay_min_ms;
        let max = self.config.typing_delay_max_ms.max(min);
        self.rng.gen_range(min..=max)
    }

    fn route(&mut self, state: &mut ConversationState, input: &str) -> Reply {
        let normalized = normalize(input);

        if let Some(reply) = capture_name(state, input, &normalized) {
            return reply;
        }
        if let Some(reply) = self.contextual(state, &normalized) {
            return reply;
        }

        let detected = KnowledgeBase::detect_topics(&normalized);
        debug!(?detected, "topics detected");
        if detected.len() > 1 {
            return multi_topic(state, &detected);
        }
        if let Some(topic) = detected.first().and_then(|key| KnowledgeBase::topic(key)) {
            return self.single_topic(state, topic);
        }

        if let Some(reply) = continuation(state, &normalized) {
            return reply;
        }
        fallback(&normalized)
    }

    fn contextual(&mut self, state: &ConversationState, normalized: &str) -> Option<Reply> {
        let category = KnowledgeBase::contextual_categories()
            .find(|category| category.matches_normalized(normalized))?;
        let template = category
            .responses()
            .choose(&mut self.rng)
            .map(String::as_str)
            .unwrap_or_default();
        let text = personalize(template, state.user_name());
        let options = if category.offers_options() {
            labels(MENU_OPTIONS)
        } else {
            Vec::new()
        };
        Some(Reply::new(
            ReplyKind::Contextual {
                category: category.name().to_string(),
            },
            text,
            options,
        ))
    }

    fn single_topic(&mut self, state: &mut ConversationState, topic: TopicEntry<'static>) -> Reply {
        state.remember_topic(topic.key());
        let mut reply = Reply::new(
            ReplyKind::Topic {
                key: topic.key().to_string(),
            },
            topic.answer(),
            topic.option_labels(),
        );
        reply.follow_up = related_suggestion(&topic).map(|text| FollowUp {
            delay_ms: self.config.related_delay_ms,
            text,
        });
        reply
    }
}

fn capture_name(
    state: &mut ConversationState,
    input: &str,
    normalized: &str,
) -> Option<Reply> {
    if state.user_name.is_some() {
        return None;
    }
    if !normalized.contains("me llamo") && !normalized.contains("soy") {
        return None;
    }
    let name = NAME_PATTERN.captures(input.trim())?.get(1)?.as_str().to_string();
    debug!(%name, "captured user name");
    let text = format!(
        "¡Mucho gusto, {name}! 😊 Es un placer ayudarte. ¿Qué te gustaría saber sobre el Cablebús?"
    );
    state.user_name = Some(name.clone());
    Some(Reply::new(
        ReplyKind::NameCapture { name },
        text,
        labels(NAME_OPTIONS),
    ))
}

fn multi_topic(state: &mut ConversationState, detected: &[&str]) -> Reply {
    let topics: Vec<String> = detected.iter().map(|key| key.to_string()).collect();
    if let Some(response) = KnowledgeBase::combined_response(detected) {
        state.remember_topic(detected[0]);
        return Reply::new(
            ReplyKind::Combined { topics },
            response,
            labels(COMBINED_OPTIONS),
        );
    }

    let entries: Vec<TopicEntry<'static>> = detected
        .iter()
        .filter_map(|key| KnowledgeBase::topic(key))
        .collect();
    let mut text = String::from("¡Gran pregunta! Te cuento sobre cada tema:<br><br>");
    for (idx, topic) in entries.iter().enumerate() {
        text.push_str(&format!(
            "<strong>{}. {}</strong><br>{}<br><br>",
            idx + 1,
            topic.question(),
            topic.short_answer()
        ));
    }
    text.push_str("¿Sobre cuál te gustaría saber más?");
    let options = entries
        .iter()
        .map(|topic| topic.question().to_string())
        .collect();
    Reply::new(ReplyKind::MultiTopic { topics }, text, options)
}

fn continuation(state: &ConversationState, normalized: &str) -> Option<Reply> {
    if !CONTINUATION_PATTERN.is_match(normalized) {
        return None;
    }
    continuation_of_last_topic(state)
}

fn continuation_of_last_topic(state: &ConversationState) -> Option<Reply> {
    let topic = KnowledgeBase::topic(state.last_topic()?)?;
    Some(Reply::new(
        ReplyKind::Continuation {
            key: topic.key().to_string(),
        },
        topic.answer(),
        topic.option_labels(),
    ))
}

fn fallback(normalized: &str) -> Reply {
    for rule in FALLBACK_RULES.iter() {
        if rule.pattern.is_match(normalized) {
            return Reply::new(
                ReplyKind::Fallback {
                    fallback: rule.fallback,
                },
                rule.response,
                labels(rule.options),
            );
        }
    }
    Reply::new(
        ReplyKind::Fallback {
            fallback: Fallback::Generic,
        },
        GENERIC_FALLBACK,
        labels(GENERIC_FALLBACK_OPTIONS),
    )
}

/// "More details" expands the last topic when there is one.
fn special_reply(state: &ConversationState, special: SpecialOption) -> Reply {
    if special == SpecialOption::Details {
        if let Some(reply) = continuation_of_last_topic(state) {
            return reply;
        }
    }
    Reply::new(
        ReplyKind::Special { option: special },
        special.text(),
        labels(special.options()),
    )
}

fn option_topic(normalized: &str) -> Option<TopicEntry<'static>> {
    KnowledgeBase::topics()
        .find(|topic| topic.opens_on_option(normalized))
        .or_else(|| {
            KnowledgeBase::topics().find(|topic| {
                normalized.contains(topic.key())
                    || topic.question().to_lowercase().contains(normalized)
            })
        })
}

fn related_suggestion(topic: &TopicEntry<'_>) -> Option<String> {
    let names: Vec<String> = topic
        .related()
        .map(|related| related.question().replacen('¿', "", 1).replacen('?', "", 1))
        .collect();
    if names.is_empty() {
        return None;
    }
    Some(format!(
        "💡 También te puede interesar: <strong>{}</strong>",
        names.join("</strong>, <strong>")
    ))
}

fn personalize(template: &str, user_name: Option<&str>) -> String {
    let name = user_name.map(|name| format!(" {name}")).unwrap_or_default();
    template.replace(NAME_PLACEHOLDER, &name)
}

fn labels(options: &[&str]) -> Vec<String> {
    options.iter().map(|option| option.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(seed: u64) -> Router<SmallRng> {
        Router::with_rng(ChatConfig::default(), SmallRng::seed_from_u64(seed))
    }

    #[test]
    fn fare_question_answers_single_topic() {
        let mut router = router(1);
        let mut state = ConversationState::new();
        let reply = router.respond(&mut state, "cuanto cuesta");
        assert_eq!(
            reply.kind,
            ReplyKind::Topic {
                key: "tarifas".into()
            }
        );
        assert!(reply.text.contains("$12 MXN"));
        assert_eq!(
            reply.options,
            vec!["Ver formas de pago", "Ver descuentos", "Ver horarios"]
        );
        assert_eq!(state.last_topic(), Some("tarifas"));
        let follow_up = reply.follow_up.expect("related topics suggested");
        assert_eq!(follow_up.delay_ms, 1_500);
        assert!(follow_up.text.starts_with("💡 También te puede interesar: <strong>"));
        assert!(follow_up.text.contains("Cómo puedo pagar"));
        assert!(!follow_up.text.contains('¿'));
    }

    #[test]
    fn schedule_and_fare_use_combined_response() {
        let mut router = router(2);
        let mut state = ConversationState::new();
        let reply = router.respond(&mut state, "horarios y tarifas");
        assert_eq!(
            Some(reply.text.as_str()),
            KnowledgeBase::combined_response(&["horarios", "tarifas"])
        );
        assert_eq!(reply.options, labels(COMBINED_OPTIONS));
        assert_eq!(state.last_topic(), Some("horarios"));
        assert!(reply.follow_up.is_none());
    }

    #[test]
    fn unknown_combination_enumerates_in_detection_order() {
        let mut router = router(3);
        let mut state = ConversationState::new();
        let reply = router.respond(&mut state, "seguridad y capacidad");
        assert_eq!(
            reply.kind,
            ReplyKind::MultiTopic {
                topics: vec!["seguridad".into(), "capacidad".into()]
            }
        );
        assert!(reply.text.contains("<strong>1. ¿Qué medidas de seguridad tiene?</strong>"));
        assert!(reply.text.contains("<strong>2. ¿Cuántas personas caben en cada cabina?</strong>"));
        assert_eq!(
            reply.options,
            vec![
                "¿Qué medidas de seguridad tiene?",
                "¿Cuántas personas caben en cada cabina?"
            ]
        );
        assert_eq!(state.last_topic(), None);
    }

    #[test]
    fn affirmative_repeats_last_topic() {
        let mut router = router(4);
        let mut state = ConversationState::new();
        let first = router.respond(&mut state, "cuanto cuesta");
        let again = router.respond(&mut state, "si");
        assert_eq!(
            again.kind,
            ReplyKind::Continuation {
                key: "tarifas".into()
            }
        );
        assert_eq!(again.text, first.text);
        assert_eq!(again.options, first.options);
        assert!(again.follow_up.is_none());
    }

    #[test]
    fn affirmative_without_context_falls_back() {
        let mut router = router(5);
        let mut state = ConversationState::new();
        let reply = router.respond(&mut state, "ok");
        assert_eq!(
            reply.kind,
            ReplyKind::Fallback {
                fallback: Fallback::Generic
            }
        );
    }

    #[test]
    fn name_is_captured_once_and_used_in_greetings() {
        for seed in 0..16 {
            let mut router = router(seed);
            let mut state = ConversationState::new();
            let reply = router.respond(&mut state, "Me llamo Ana");
            assert_eq!(reply.kind, ReplyKind::NameCapture { name: "Ana".into() });
            assert_eq!(reply.options, labels(NAME_OPTIONS));

            let greeting = router.respond(&mut state, "hola");
            assert!(greeting.text.contains("Ana"), "seed {seed}: {}", greeting.text);
            assert!(!greeting.text.contains(NAME_PLACEHOLDER));

            let again = router.respond(&mut state, "soy Pedro");
            assert!(!matches!(again.kind, ReplyKind::NameCapture { .. }));
            assert_eq!(state.user_name(), Some("Ana"));
        }
    }

    #[test]
    fn greeting_without_name_has_no_placeholder() {
        let mut router = router(6);
        let mut state = ConversationState::new();
        let reply = router.respond(&mut state, "hola");
        assert!(!reply.text.contains(NAME_PLACEHOLDER));
        assert_eq!(reply.options, labels(MENU_OPTIONS));
    }

    #[test]
    fn farewell_and_thanks_carry_no_options() {
        let mut router = router(7);
        let mut state = ConversationState::new();
        let bye = router.respond(&mut state, "adios");
        assert_eq!(
            bye.kind,
            ReplyKind::Contextual {
                category: "despedida".into()
            }
        );
        assert!(bye.options.is_empty());

        let thanks = router.respond(&mut state, "muchas gracias");
        assert!(thanks.options.is_empty());
    }

    #[test]
    fn seeded_routers_agree() {
        let mut a = router(42);
        let mut b = router(42);
        let mut sa = ConversationState::new();
        let mut sb = ConversationState::new();
        for _ in 0..5 {
            assert_eq!(a.respond(&mut sa, "hola").text, b.respond(&mut sb, "hola").text);
        }
    }

    #[test]
    fn fallback_ladder_order() {
        let mut router = router(8);
        let mut state = ConversationState::new();
        let cases = [
            ("esto es confuso", Fallback::Confusion),
            ("necesito info", Fallback::Urgency),
            ("busco empleo", Fallback::Employment),
            ("xyz", Fallback::Generic),
        ];
        for (input, expected) in cases {
            let reply = router.respond(&mut state, input);
            assert_eq!(reply.kind, ReplyKind::Fallback { fallback: expected }, "{input}");
        }
    }

    #[test]
    fn history_records_both_sides() {
        let mut router = router(9);
        let mut state = ConversationState::new();
        router.respond(&mut state, "hola");
        router.respond(&mut state, "cuanto cuesta");
        let speakers: Vec<_> = state.history().iter().map(|turn| turn.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Bot, Speaker::User, Speaker::Bot]
        );
        assert_eq!(state.history()[2].text, "cuanto cuesta");
    }

    #[test]
    fn options_resolve_topics_specials_and_typed_fallback() {
        let mut router = router(10);
        let mut state = ConversationState::new();

        let fares = router.select_option(&mut state, "Ver tarifas");
        assert_eq!(fares.kind, ReplyKind::Topic { key: "tarifas".into() });

        let question = router.select_option(&mut state, "¿Cuántas personas caben en cada cabina?");
        assert_eq!(question.kind, ReplyKind::Topic { key: "capacidad".into() });
        assert_eq!(state.last_topic(), Some("capacidad"));

        let restart = router.select_option(&mut state, "Volver al inicio");
        assert_eq!(
            restart.kind,
            ReplyKind::Special {
                option: SpecialOption::Restart
            }
        );

        let contact = router.select_option(&mut state, "Hablar con alguien");
        assert_eq!(
            contact.kind,
            ReplyKind::Special {
                option: SpecialOption::Contact
            }
        );

        let map = router.select_option(&mut state, "Ver mapa");
        assert_eq!(map.kind, ReplyKind::Topic { key: "estaciones".into() });
    }

    fn offered_labels() -> Vec<String> {
        let mut offered: Vec<String> = KnowledgeBase::topics()
            .flat_map(|topic| {
                let question = topic.question().to_string();
                topic.option_labels().into_iter().chain(std::iter::once(question))
            })
            .collect();
        let specials = [
            SpecialOption::Features,
            SpecialOption::Contact,
            SpecialOption::Faq,
            SpecialOption::Details,
            SpecialOption::AnotherQuestion,
            SpecialOption::Restart,
        ];
        let canned = [MENU_OPTIONS, NAME_OPTIONS, COMBINED_OPTIONS, GENERIC_FALLBACK_OPTIONS]
            .into_iter()
            .chain(FALLBACK_RULES.iter().map(|rule| rule.options))
            .chain(specials.iter().map(|special| special.options()));
        for group in canned {
            offered.extend(labels(group));
        }
        offered.sort();
        offered.dedup();
        offered
    }

    #[test]
    fn every_offered_option_resolves() {
        let mut unresolved = Vec::new();
        for label in offered_labels() {
            let mut router = router(13);
            let mut state = ConversationState::new();
            let reply = router.select_option(&mut state, &label);
            if matches!(reply.kind, ReplyKind::Fallback { .. }) {
                unresolved.push(format!("{label:?} -> {:?}", reply.kind));
            }
        }
        assert!(unresolved.is_empty(), "unresolved options: {unresolved:?}");
    }

    #[test]
    fn option_aliases_open_their_topics() {
        let mut router = router(14);
        let mut state = ConversationState::new();
        let cases = [
            ("Ver descuentos", "tarifas"),
            ("Ver certificaciones", "seguridad"),
            ("Ver avances", "inauguracion"),
            ("Ver más información", "inauguracion"),
            ("Ver sustentabilidad", "ambiente"),
        ];
        for (label, key) in cases {
            let reply = router.select_option(&mut state, label);
            assert_eq!(reply.kind, ReplyKind::Topic { key: key.into() }, "{label}");
        }
    }

    #[test]
    fn more_details_expands_last_topic() {
        let mut router = router(15);
        let mut state = ConversationState::new();
        let cold = router.select_option(&mut state, "Ver más detalles");
        assert_eq!(
            cold.kind,
            ReplyKind::Special {
                option: SpecialOption::Details
            }
        );

        router.respond(&mut state, "horarios y tarifas");
        let details = router.select_option(&mut state, "Ver más detalles");
        assert_eq!(
            details.kind,
            ReplyKind::Continuation {
                key: "horarios".into()
            }
        );

        let another = router.select_option(&mut state, "Otra pregunta");
        assert_eq!(another.options, labels(MENU_OPTIONS));
        assert!(matches!(another.kind, ReplyKind::Special { .. }));
    }

    #[test]
    fn quick_action_records_question_and_topic() {
        let mut router = router(11);
        let mut state = ConversationState::new();
        let reply = router.quick_action(&mut state, "pago").expect("known topic");
        assert_eq!(reply.kind, ReplyKind::Topic { key: "pago".into() });
        assert_eq!(state.history()[0].text, "¿Cómo puedo pagar?");
        assert_eq!(state.last_topic(), Some("pago"));
        assert!(router.quick_action(&mut state, "nope").is_none());
    }

    #[test]
    fn typing_delay_stays_in_bounds() {
        let mut router = router(12);
        for _ in 0..100 {
            let delay = router.typing_delay();
            assert!((800..=1_600).contains(&delay));
        }
    }
}
