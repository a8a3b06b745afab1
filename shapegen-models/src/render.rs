//! Chat template rendering.
//!
//! A [`TemplateRenderer`] turns the template text chosen by the format
//! resolver plus a list of messages into one prompt string. The template
//! language belongs to the renderer; the rest of the pipeline treats
//! template text as opaque.
//!
//! [`TurnRenderer`] is the built-in renderer. Its templates are lines of
//! `key: value`, one per turn kind, where `{text}` is replaced with the
//! message text and `\n`, `\t` and `\\` are escapes:
//!
//! ```text
//! inst: <|im_start|>system\n{text}<|im_end|>\n
//! in: <|im_start|>user\n{text}<|im_end|>\n
//! out: <|im_start|>assistant\n{text}<|im_end|>\n
//! gen: <|im_start|>assistant\n
//! ```
//!
//! Keys are `bos` (emitted once), `inst`, `in`, `out`, `gen` (appended when
//! a generation prompt is requested) and `sep` (between the instruction
//! and the first input when `inst` is absent, default two newlines). Without
//! an `inst` key the instruction is folded into the first input message.

use shapegen_core::{Message, Role};

use crate::error::GenerationError;

/// Renders messages into a prompt string.
pub trait TemplateRenderer: Send + Sync {
    /// Render `messages` (instruction first) with `template`.
    fn render(
        &self,
        template: &str,
        messages: &[Message],
        add_generation_prompt: bool,
    ) -> Result<String, GenerationError>;

    /// Check that `template` is usable without rendering anything.
    fn validate(&self, template: &str) -> Result<(), GenerationError> {
        self.render(template, &[Message::input("")], true).map(|_| ())
    }
}

/// The built-in line-oriented turn renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnRenderer;

#[derive(Debug, Default)]
struct TurnTemplate {
    bos: String,
    inst: Option<String>,
    input: String,
    output: String,
    generation: String,
    sep: Option<String>,
}

impl TurnTemplate {
    fn parse(template: &str) -> Result<Self, GenerationError> {
        let mut parsed = TurnTemplate::default();
        let mut has_in = false;
        let mut has_out = false;

        for (lineno, line) in template.lines().enumerate() {
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| {
                GenerationError::render(format!("line {}: expected `key: value`", lineno + 1))
            })?;
            let value = unescape(value.strip_prefix(' ').unwrap_or(value));
            match key.trim() {
                "bos" => parsed.bos = value,
                "inst" => parsed.inst = Some(value),
                "in" => {
                    parsed.input = value;
                    has_in = true;
                }
                "out" => {
                    parsed.output = value;
                    has_out = true;
                }
                "gen" => parsed.generation = value,
                "sep" => parsed.sep = Some(value),
                other => {
                    return Err(GenerationError::render(format!(
                        "line {}: unknown key '{other}'",
                        lineno + 1
                    )))
                }
            }
        }

        if !has_in || !has_out {
            return Err(GenerationError::render(
                "template must define both `in` and `out`",
            ));
        }
        Ok(parsed)
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl TemplateRenderer for TurnRenderer {
    fn render(
        &self,
        template: &str,
        messages: &[Message],
        add_generation_prompt: bool,
    ) -> Result<String, GenerationError> {
        let tpl = TurnTemplate::parse(template)?;
        let mut out = tpl.bos.clone();
        let mut pending_inst: Option<&str> = None;

        for msg in messages {
            match msg.role {
                Role::Inst => match &tpl.inst {
                    Some(inst) => out.push_str(&inst.replace("{text}", &msg.text)),
                    None => pending_inst = Some(msg.text.as_str()),
                },
                Role::In => {
                    let text = match pending_inst.take() {
                        Some(inst) => {
                            let sep = tpl.sep.as_deref().unwrap_or("\n\n");
                            format!("{inst}{sep}{}", msg.text)
                        }
                        None => msg.text.clone(),
                    };
                    out.push_str(&tpl.input.replace("{text}", &text));
                }
                Role::Out => out.push_str(&tpl.output.replace("{text}", &msg.text)),
            }
        }

        // An instruction with no input after it still has to reach the model
        if let Some(inst) = pending_inst {
            out.push_str(&tpl.input.replace("{text}", inst));
        }

        if add_generation_prompt {
            out.push_str(&tpl.generation);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CHATML: &str = "inst: <|im_start|>system\\n{text}<|im_end|>\\n\n\
                          in: <|im_start|>user\\n{text}<|im_end|>\\n\n\
                          out: <|im_start|>assistant\\n{text}<|im_end|>\\n\n\
                          gen: <|im_start|>assistant\\n";

    const LLAMA2: &str = "bos: <s>\n\
                          in: [INST] {text} [/INST]\n\
                          out:  {text} </s><s>\n\
                          sep: \\n\\n";

    #[test]
    fn test_chatml() {
        let messages = vec![
            Message::inst("Be terse."),
            Message::input("Hi"),
            Message::output("Hello"),
            Message::input("Age?"),
        ];
        let prompt = TurnRenderer.render(CHATML, &messages, true).unwrap();
        assert_eq!(
            prompt,
            "<|im_start|>system\nBe terse.<|im_end|>\n\
             <|im_start|>user\nHi<|im_end|>\n\
             <|im_start|>assistant\nHello<|im_end|>\n\
             <|im_start|>user\nAge?<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_inst_folded_into_first_input() {
        let messages = vec![Message::inst("Sys"), Message::input("Q")];
        let prompt = TurnRenderer.render(LLAMA2, &messages, false).unwrap();
        assert_eq!(prompt, "<s>[INST] Sys\n\nQ [/INST]");
    }

    #[test]
    fn test_inst_only() {
        let prompt = TurnRenderer.render(LLAMA2, &[Message::inst("Sys")], false).unwrap();
        assert_eq!(prompt, "<s>[INST] Sys [/INST]");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(TurnRenderer.validate("in: {text}").is_err());
        assert!(TurnRenderer.validate("in: {text}\nout: {text}\nrole: x").is_err());
        assert!(TurnRenderer.validate("just text").is_err());
        assert!(TurnRenderer.validate("in: {text}\nout: {text}").is_ok());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb\tc\\d\q"), "a\nb\tc\\d\\q");
    }
}
