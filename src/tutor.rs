//! Tutor chat: sessions, deterministic topic replies and the reply/summary cache.
//!
//! Replies are generated locally from keyword rules. Similar questions asked in
//! a similar conversational context share a cache entry (see
//! `cache::chat_response_key`).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cache::{self, CacheStats, TtlCache};
use crate::clock::SharedClock;
use crate::config::CacheConfig;
use crate::domain::{round1, StudentId};
use crate::error::{CoreError, CoreResult};
use crate::util::{page_window, trunc_for_log, Page, Pagination};

/// Messages of recent history considered when fingerprinting a question.
const HISTORY_WINDOW: usize = 10;

const GREETINGS: [&str; 3] = [
  "Oi! Eu sou o Curió, seu tutor virtual! 😊 Estou aqui para te ajudar com qualquer dúvida que você tiver. Sobre o que você gostaria de conversar hoje?",
  "Olá! Que bom te ver aqui! Sou o Curió e adoro ajudar crianças a aprender coisas novas. O que você está estudando ou tem curiosidade para saber?",
  "Oi, amiguinho! Eu sou o Curió, seu assistente de estudos! 🎓 Pode me perguntar sobre matemática, ciências, história, português... qualquer coisa! Do que você quer falar?",
];

/// (question, context fingerprint) pairs pre-answered at startup.
const COMMON_QUESTIONS: [(&str, &str); 6] = [
  ("oi", "general"),
  ("como somar números?", "math"),
  ("me conta sobre animais", "science"),
  ("história do brasil", "history"),
  ("como aprender a ler?", "portuguese"),
  ("me conta sobre o brasil", "geography"),
];

// -------- Topics --------

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
  Math,
  Science,
  History,
  Portuguese,
  Geography,
}

impl Topic {
  /// Detection order; the first topic with a matching keyword wins.
  pub const ALL: [Topic; 5] = [Topic::Math, Topic::Science, Topic::History, Topic::Portuguese, Topic::Geography];

  fn keywords(self) -> &'static [&'static str] {
    match self {
      Topic::Math => &["matemática", "conta", "número", "somar"],
      Topic::Science => &["ciência", "animal", "planta", "espaço"],
      Topic::History => &["história", "brasil", "passado"],
      Topic::Portuguese => &["português", "palavra", "ler", "escrever"],
      Topic::Geography => &["geografia", "país", "mapa"],
    }
  }

  /// Substring match on the lowercased text.
  pub fn detect(text: &str) -> Option<Topic> {
    let lowered = text.to_lowercase();
    Topic::ALL.into_iter().find(|t| t.keywords().iter().any(|k| lowered.contains(k)))
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Topic::Math => "math",
      Topic::Science => "science",
      Topic::History => "history",
      Topic::Portuguese => "portuguese",
      Topic::Geography => "geography",
    }
  }

  fn lesson(self) -> &'static str {
    match self {
      Topic::Math => "A matemática é como um jogo de números! 🔢 Somar é juntar quantidades: 2 + 3 = 5. Dica: use os dedos ou objetos para visualizar. Qual conta você quer resolver comigo?",
      Topic::Science => "A ciência explica o mundo ao nosso redor! 🔬 Animais, plantas e até as estrelas seguem regras que podemos descobrir observando. Que mais você gostaria de saber sobre esse assunto?",
      Topic::History => "A história conta como as pessoas viviam antes de nós! 📜 O Brasil, por exemplo, tem povos indígenas que vivem aqui há milhares de anos. Que período da história mais te interessa?",
      Topic::Portuguese => "O português é a nossa língua! 📖 Ler um pouquinho todo dia ajuda a escrever cada vez melhor. Com que parte do português você quer mais ajuda?",
      Topic::Geography => "A geografia estuda os lugares do nosso planeta! 🗺️ Mapas mostram países, rios e montanhas. Que lugar do mundo mais desperta sua curiosidade?",
    }
  }
}

// -------- Messages & sessions --------

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
  Student,
  Tutor,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChatMessage {
  pub id: Uuid,
  pub session_id: Uuid,
  pub sender: Sender,
  pub message: String,
  pub message_type: String,
  pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatSession {
  pub id: Uuid,
  pub student_id: StudentId,
  pub problem_id: Option<u32>,
  pub started_at: DateTime<Utc>,
  pub last_activity: DateTime<Utc>,
  #[serde(skip)]
  messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TutorReply {
  pub message: String,
  pub message_type: String,
}

impl TutorReply {
  fn new(message: impl Into<String>, message_type: &str) -> Self {
    Self { message: message.into(), message_type: message_type.to_string() }
  }
}

#[derive(Clone, Debug, Serialize)]
pub struct MessageExchange {
  pub student_message: ChatMessage,
  pub tutor_response: ChatMessage,
  pub cache_hit: bool,
  pub cache_size: usize,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Engagement {
  None,
  Low,
  Medium,
  High,
}

impl Engagement {
  pub fn from_student_messages(count: usize) -> Self {
    match count {
      0 => Engagement::None,
      1..=2 => Engagement::Low,
      3..=7 => Engagement::Medium,
      _ => Engagement::High,
    }
  }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SessionSummary {
  pub total_messages: usize,
  pub student_messages: usize,
  pub topics_discussed: Vec<Topic>,
  pub engagement_level: Engagement,
  pub session_duration_minutes: f64,
  pub last_activity: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TutorPerformance {
  pub cached_responses: usize,
  pub capacity: usize,
  pub cache: CacheStats,
  pub cache_hit_ratio: f64,
  pub active_sessions: usize,
}

#[derive(Clone)]
enum Cached {
  Reply(TutorReply),
  Summary(SessionSummary),
}

// -------- Reply generation --------

const CONFUSION_WORDS: [&str; 7] = ["não entendo", "confuso", "difícil", "não sei", "ajuda", "perdido", "complicado"];
const FAREWELL_WORDS: [&str; 3] = ["tchau", "até logo", "bye"];
const THANKS_WORDS: [&str; 3] = ["obrigado", "obrigada", "valeu"];
const GREETING_WORDS: [&str; 5] = ["oi", "olá", "bom dia", "boa tarde", "boa noite"];

/// Stable choice among variants so equal questions get equal answers.
fn pick<'a>(options: &[&'a str], seed: &str) -> &'a str {
  let n = seed.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)));
  options[n % options.len()]
}

fn has_word(text: &str, words: &[&str]) -> bool {
  text.split_whitespace().any(|w| words.contains(&w))
}

/// Deterministic reply for one student message.
pub fn generate_reply(message: &str) -> TutorReply {
  let normalized = cache::normalize_message(message);
  let lowered = message.to_lowercase();

  if CONFUSION_WORDS.iter().any(|w| lowered.contains(w)) {
    let text = pick(
      &[
        "Não se preocupe! Todo mundo tem dificuldades às vezes. O importante é não desistir! Vamos tentar de um jeito diferente? 💪",
        "Ei, não fique triste! Aprender é como andar de bicicleta: no começo é difícil, mas depois fica fácil! Vou te ajudar passo a passo! 🚲",
      ],
      &normalized,
    );
    return TutorReply::new(text, "encouragement");
  }
  if FAREWELL_WORDS.iter().any(|w| lowered.contains(w)) {
    return TutorReply::new("Tchau! Foi muito legal conversar com você! Continue sempre curioso e estudando! 👋😊", "farewell");
  }
  if has_word(&normalized, &THANKS_WORDS) {
    return TutorReply::new("De nada! Fico muito feliz em poder te ajudar! 😊", "thanks");
  }
  if has_word(&normalized, &GREETING_WORDS) || GREETING_WORDS.iter().any(|w| w.contains(' ') && normalized.contains(w)) {
    let text = pick(
      &[
        "Oi! Que bom te ver de novo! Como posso te ajudar hoje? 😊",
        "Olá! Estou aqui e pronto para aprender junto com você! O que vamos descobrir hoje? 🎓",
        "Oi, amiguinho! Que alegria! Sobre o que você quer conversar? 🌟",
      ],
      &normalized,
    );
    return TutorReply::new(text, "greeting");
  }
  if let Some(topic) = Topic::detect(message) {
    return TutorReply::new(topic.lesson(), "educational");
  }

  let starter = if lowered.contains("por que") {
    "Ótima pergunta sobre o porquê das coisas!"
  } else if lowered.contains("como") {
    "Vamos descobrir como isso funciona!"
  } else {
    "Que interessante!"
  };
  let tail = pick(
    &[
      "Essa é uma pergunta muito inteligente! Que tal pesquisarmos juntos? 🤔",
      "Você sabe que pode me perguntar sobre matemática, ciências, história, português e muitas outras coisas? 📚",
      "Que tal me contar mais sobre o que você está pensando? Assim posso te ajudar melhor! 💭",
    ],
    &normalized,
  );
  TutorReply::new(format!("{} {}", starter, tail), "educational")
}

// -------- Desk --------

pub struct TutorDesk {
  sessions: HashMap<Uuid, ChatSession>,
  next_seq: u64,
  cache: TtlCache<Cached>,
  chat_ttl: Duration,
  summary_ttl: Duration,
  clock: SharedClock,
}

impl TutorDesk {
  pub fn new(cfg: &CacheConfig, clock: SharedClock) -> Self {
    Self {
      sessions: HashMap::new(),
      next_seq: 0,
      cache: TtlCache::new("tutor", cfg.tutor_capacity, clock.clone()),
      chat_ttl: Duration::seconds(cfg.chat_response_ttl_secs),
      summary_ttl: Duration::seconds(cfg.session_summary_ttl_secs),
      clock,
    }
  }

  /// Pre-answers common questions. Returns how many entries were added.
  pub fn warm_up(&mut self) -> usize {
    let mut added = 0;
    for (question, context) in COMMON_QUESTIONS {
      let key = cache::chat_response_key(question, context);
      if !self.cache.contains_key(&key) {
        self.cache.put(key, Cached::Reply(generate_reply(question)));
        added += 1;
      }
    }
    info!(target: "tutor", added, "Tutor cache warmed up");
    added
  }

  #[instrument(level = "info", skip(self))]
  pub fn start_session(&mut self, student_id: StudentId, problem_id: Option<u32>) -> (ChatSession, ChatMessage) {
    let now = self.clock.now();
    let seq = self.next_seq;
    self.next_seq += 1;

    let id = Uuid::new_v4();
    let welcome = ChatMessage {
      id: Uuid::new_v4(),
      session_id: id,
      sender: Sender::Tutor,
      message: GREETINGS[(seq % GREETINGS.len() as u64) as usize].to_string(),
      message_type: "greeting".into(),
      timestamp: now,
    };
    let session = ChatSession {
      id,
      student_id,
      problem_id,
      started_at: now,
      last_activity: now,
      messages: vec![welcome.clone()],
    };
    self.sessions.insert(id, session.clone());
    info!(target: "tutor", %id, student_id, "Chat session started");
    (session, welcome)
  }

  #[instrument(level = "info", skip(self, text), fields(len = text.len()))]
  pub fn send_message(&mut self, session_id: Uuid, text: &str) -> CoreResult<MessageExchange> {
    let text = text.trim();
    if text.is_empty() {
      return Err(CoreError::invalid("Mensagem não pode estar vazia"));
    }
    let now = self.clock.now();
    let session = self
      .sessions
      .get_mut(&session_id)
      .ok_or_else(|| CoreError::not_found("chat session", session_id))?;

    let start = session.messages.len().saturating_sub(HISTORY_WINDOW);
    let recent: Vec<&str> = session.messages[start..].iter().map(|m| m.message.as_str()).collect();
    let fingerprint = cache::context_fingerprint(&recent);
    let key = cache::chat_response_key(text, &fingerprint);

    let (reply, cache_hit) = match self.cache.get(&key, self.chat_ttl) {
      Some(Cached::Reply(reply)) => (reply, true),
      _ => {
        let reply = generate_reply(text);
        self.cache.put(key, Cached::Reply(reply.clone()));
        (reply, false)
      }
    };
    debug!(target: "tutor", %session_id, %fingerprint, cache_hit, message = %trunc_for_log(text, 80), "Tutor reply ready");

    let student_message = ChatMessage {
      id: Uuid::new_v4(),
      session_id,
      sender: Sender::Student,
      message: text.to_string(),
      message_type: "text".into(),
      timestamp: now,
    };
    let tutor_response = ChatMessage {
      id: Uuid::new_v4(),
      session_id,
      sender: Sender::Tutor,
      message: reply.message,
      message_type: reply.message_type,
      timestamp: now,
    };
    session.messages.push(student_message.clone());
    session.messages.push(tutor_response.clone());
    session.last_activity = now;

    Ok(MessageExchange { student_message, tutor_response, cache_hit, cache_size: self.cache.len() })
  }

  /// Page 1 holds the latest messages; each page is returned in chronological order.
  pub fn history(&self, session_id: Uuid, page: Option<usize>, per_page: Option<usize>) -> CoreResult<Page<ChatMessage>> {
    let session = self
      .sessions
      .get(&session_id)
      .ok_or_else(|| CoreError::not_found("chat session", session_id))?;
    let (page, per_page, offset) = page_window(page, per_page);
    let total = session.messages.len();
    let mut items: Vec<ChatMessage> = session.messages.iter().rev().skip(offset).take(per_page).cloned().collect();
    items.reverse();
    Ok(Page { items, pagination: Pagination::new(page, per_page, total) })
  }

  /// Returns the summary and whether it came from the cache.
  pub fn summary(&mut self, session_id: Uuid) -> CoreResult<(SessionSummary, bool)> {
    let key = cache::summary_key(&session_id.to_string());
    if let Some(Cached::Summary(summary)) = self.cache.get(&key, self.summary_ttl) {
      return Ok((summary, true));
    }
    let session = self
      .sessions
      .get(&session_id)
      .ok_or_else(|| CoreError::not_found("chat session", session_id))?;

    let student: Vec<&ChatMessage> = session.messages.iter().filter(|m| m.sender == Sender::Student).collect();
    let mut topics_discussed = Vec::new();
    for topic in student.iter().filter_map(|m| Topic::detect(&m.message)) {
      if !topics_discussed.contains(&topic) {
        topics_discussed.push(topic);
      }
    }
    let duration = match (session.messages.first(), session.messages.last()) {
      (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_seconds() as f64 / 60.0,
      _ => 0.0,
    };
    let summary = SessionSummary {
      total_messages: session.messages.len(),
      student_messages: student.len(),
      topics_discussed,
      engagement_level: Engagement::from_student_messages(student.len()),
      session_duration_minutes: round1(duration),
      last_activity: session.last_activity,
    };
    self.cache.put(key, Cached::Summary(summary.clone()));
    Ok((summary, false))
  }

  pub fn performance(&self) -> TutorPerformance {
    let cutoff = self.clock.now() - Duration::hours(1);
    let stats = self.cache.stats();
    TutorPerformance {
      cached_responses: self.cache.len(),
      capacity: self.cache.capacity(),
      cache: stats,
      cache_hit_ratio: stats.hit_ratio(),
      active_sessions: self.sessions.values().filter(|s| s.last_activity >= cutoff).count(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use chrono::NaiveDate;
  use std::sync::Arc;

  fn desk() -> (TutorDesk, ManualClock) {
    let clock = ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    (TutorDesk::new(&CacheConfig::default(), Arc::new(clock.clone())), clock)
  }

  #[test]
  fn test_topic_detection_order() {
    assert_eq!(Topic::detect("Quero SOMAR"), Some(Topic::Math));
    // "história do brasil" mentions history before portuguese keywords
    assert_eq!(Topic::detect("história do brasil"), Some(Topic::History));
    assert_eq!(Topic::detect("um mapa do país"), Some(Topic::Geography));
    assert_eq!(Topic::detect("tudo bem?"), None);
  }

  #[test]
  fn test_greeting_rotates_by_sequence() {
    let (mut d, _clock) = desk();
    let (_, first) = d.start_session(1, None);
    let (_, second) = d.start_session(1, None);
    let (_, _third) = d.start_session(1, None);
    let (_, fourth) = d.start_session(1, Some(3));
    assert_eq!(first.message, GREETINGS[0]);
    assert_eq!(second.message, GREETINGS[1]);
    assert_eq!(fourth.message, GREETINGS[0]);
    assert_eq!(first.message_type, "greeting");
  }

  #[test]
  fn test_similar_questions_share_cached_reply() {
    let (mut d, _clock) = desk();
    let (a, _) = d.start_session(1, None);
    let (b, _) = d.start_session(2, None);

    let first = d.send_message(a.id, "Como somar números?").unwrap();
    assert!(!first.cache_hit);
    let second = d.send_message(b.id, "  como SOMAR   números").unwrap();
    assert!(second.cache_hit);
    assert_eq!(first.tutor_response.message, second.tutor_response.message);
    assert_eq!(second.cache_size, 1);
  }

  #[test]
  fn test_cached_reply_expires() {
    let (mut d, clock) = desk();
    let (a, _) = d.start_session(1, None);
    let (b, _) = d.start_session(2, None);
    d.send_message(a.id, "me conta uma curiosidade").unwrap();
    clock.advance(Duration::seconds(300));
    assert!(!d.send_message(b.id, "me conta uma curiosidade").unwrap().cache_hit);
  }

  #[test]
  fn test_send_message_errors() {
    let (mut d, _clock) = desk();
    let (a, _) = d.start_session(1, None);
    assert!(matches!(d.send_message(a.id, "   "), Err(CoreError::InvalidInput(_))));
    assert!(matches!(d.send_message(Uuid::new_v4(), "oi"), Err(CoreError::NotFound(_))));
    // rejected messages are not stored
    assert_eq!(d.history(a.id, None, None).unwrap().pagination.total, 1);
  }

  #[test]
  fn test_history_pages_latest_first() {
    let (mut d, _clock) = desk();
    let (a, _) = d.start_session(1, None);
    for i in 0..3 {
      d.send_message(a.id, &format!("pergunta {}", i)).unwrap();
    }
    // greeting + 3 * (student, tutor)
    let page = d.history(a.id, Some(1), Some(2)).unwrap();
    assert_eq!(page.pagination.total, 7);
    assert_eq!(page.pagination.pages, 4);
    assert_eq!(page.items[0].message, "pergunta 2");
    assert_eq!(page.items[1].sender, Sender::Tutor);

    let capped = d.history(a.id, None, Some(500)).unwrap();
    assert_eq!(capped.pagination.per_page, 50);
    assert_eq!(capped.items.first().map(|m| m.sender), Some(Sender::Tutor));
  }

  #[test]
  fn test_summary_counts_and_caches() {
    let (mut d, clock) = desk();
    let (a, _) = d.start_session(1, None);
    let (summary, cached) = d.summary(a.id).unwrap();
    assert!(!cached);
    assert_eq!(summary.engagement_level, Engagement::None);
    assert_eq!(summary.total_messages, 1);

    let (b, _) = d.start_session(1, None);
    d.send_message(b.id, "como somar?").unwrap();
    clock.advance(Duration::minutes(3));
    d.send_message(b.id, "e um animal?").unwrap();
    let (summary, cached) = d.summary(b.id).unwrap();
    assert!(!cached);
    assert_eq!(summary.student_messages, 2);
    assert_eq!(summary.engagement_level, Engagement::Low);
    assert_eq!(summary.topics_discussed, vec![Topic::Math, Topic::Science]);
    assert_eq!(summary.session_duration_minutes, 3.0);

    assert!(d.summary(b.id).unwrap().1);
    assert!(matches!(d.summary(Uuid::new_v4()), Err(CoreError::NotFound(_))));
  }

  #[test]
  fn test_engagement_levels() {
    assert_eq!(Engagement::from_student_messages(2), Engagement::Low);
    assert_eq!(Engagement::from_student_messages(3), Engagement::Medium);
    assert_eq!(Engagement::from_student_messages(8), Engagement::High);
  }

  #[test]
  fn test_warm_up_is_idempotent() {
    let (mut d, _clock) = desk();
    assert_eq!(d.warm_up(), COMMON_QUESTIONS.len());
    assert_eq!(d.warm_up(), 0);
    assert_eq!(d.performance().cached_responses, COMMON_QUESTIONS.len());
  }

  #[test]
  fn test_reply_kinds() {
    assert_eq!(generate_reply("não entendo nada").message_type, "encouragement");
    assert_eq!(generate_reply("Oi!").message_type, "greeting");
    assert_eq!(generate_reply("obrigado").message_type, "thanks");
    assert_eq!(generate_reply("me fala de um planeta e uma planta").message, Topic::Science.lesson());
    assert_eq!(generate_reply("Como somar?"), generate_reply("como somar"));
  }
}
