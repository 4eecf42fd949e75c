//! **Telephony instructions** - the declarative document returned to the
//! telephony layer after every webhook event.
//!
//! A [`TwimlResponse`] is an ordered list of directives (say, play, record,
//! redirect) rendered as TwiML XML. It is never executed here; the telephony
//! layer runs it against the live call.

/// Timing parameters for a record directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTiming {
    /// Maximum utterance length in seconds.
    pub max_length_secs: u32,
    /// Seconds of silence that end the recording.
    pub timeout_secs: u32,
    /// Whether an audible cue is played before recording.
    pub play_beep: bool,
    /// Whether leading/trailing silence is trimmed.
    pub trim_silence: bool,
}

impl Default for RecordTiming {
    fn default() -> Self {
        Self {
            max_length_secs: 12,
            timeout_secs: 2,
            play_beep: true,
            trim_silence: false,
        }
    }
}

/// One instruction for the telephony layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Speak fixed text with the telephony layer's native voice.
    Say { text: String },
    /// Play an audio artifact fetched from the given URL.
    Play { url: String },
    /// Record the caller's next utterance, then POST it to `action`.
    Record { action: String, timing: RecordTiming },
    /// Hand the call to another webhook path for a fresh turn.
    Redirect { url: String },
}

/// Ordered instruction document, rendered with [`TwimlResponse::to_xml`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwimlResponse {
    directives: Vec<Directive>,
}

impl TwimlResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.directives.push(Directive::Say { text: text.into() });
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.directives.push(Directive::Play { url: url.into() });
        self
    }

    pub fn record(mut self, action: impl Into<String>, timing: RecordTiming) -> Self {
        self.directives.push(Directive::Record {
            action: action.into(),
            timing,
        });
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.directives.push(Directive::Redirect { url: url.into() });
        self
    }

    /// The directives in the order the telephony layer will execute them.
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Render the document as TwiML.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for directive in &self.directives {
            match directive {
                Directive::Say { text } => {
                    out.push_str("<Say>");
                    out.push_str(&xml_escape(text));
                    out.push_str("</Say>");
                }
                Directive::Play { url } => {
                    out.push_str("<Play>");
                    out.push_str(&xml_escape(url));
                    out.push_str("</Play>");
                }
                Directive::Record { action, timing } => {
                    let trim = if timing.trim_silence {
                        "trim-silence"
                    } else {
                        "do-not-trim"
                    };
                    out.push_str(&format!(
                        "<Record action=\"{}\" maxLength=\"{}\" timeout=\"{}\" playBeep=\"{}\" trim=\"{}\"/>",
                        xml_escape(action),
                        timing.max_length_secs,
                        timing.timeout_secs,
                        timing.play_beep,
                        trim,
                    ));
                }
                Directive::Redirect { url } => {
                    out.push_str("<Redirect>");
                    out.push_str(&xml_escape(url));
                    out.push_str("</Redirect>");
                }
            }
        }
        out.push_str("</Response>");
        out
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
