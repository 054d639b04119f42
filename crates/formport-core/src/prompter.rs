use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// One selectable answer in a merge prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Add,
    Skip,
    KeepExisting,
    UseGenerated,
    ViewDiff,
    ViewFull,
    Quit,
}

impl Choice {
    pub fn label(self) -> &'static str {
        match self {
            Choice::Add => "add",
            Choice::Skip => "skip",
            Choice::KeepExisting => "keep",
            Choice::UseGenerated => "replace",
            Choice::ViewDiff => "diff",
            Choice::ViewFull => "full",
            Choice::Quit => "quit",
        }
    }

    fn hotkey(self) -> char {
        match self {
            Choice::Add => 'a',
            Choice::Skip => 's',
            Choice::KeepExisting => 'k',
            Choice::UseGenerated => 'r',
            Choice::ViewDiff => 'd',
            Choice::ViewFull => 'f',
            Choice::Quit => 'q',
        }
    }
}

/// Choices offered for a member present only in the generated file.
pub const NEW_MEMBER_CHOICES: &[Choice] = &[
    Choice::Add,
    Choice::Skip,
    Choice::ViewDiff,
    Choice::ViewFull,
    Choice::Quit,
];

/// Choices offered for a member that differs between the two files.
pub const CHANGED_MEMBER_CHOICES: &[Choice] = &[
    Choice::KeepExisting,
    Choice::UseGenerated,
    Choice::ViewDiff,
    Choice::Quit,
];

/// The merge engine's only route to the operator. Injected so tests can
/// drive a merge without a terminal.
pub trait Prompter {
    /// Display a block of informational text.
    fn show(&mut self, text: &str);

    /// Put one question to the operator. The reply is always one of
    /// `choices`.
    fn ask(&mut self, question: &str, choices: &[Choice]) -> Choice;
}

/// Reads answers from stdin. EOF or a read error answers `Quit`.
#[derive(Debug, Default)]
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn show(&mut self, text: &str) {
        println!("{text}");
    }

    fn ask(&mut self, question: &str, choices: &[Choice]) -> Choice {
        let menu = choices
            .iter()
            .map(|c| {
                let label = c.label();
                format!("[{}]{}", c.hotkey(), &label[1..])
            })
            .collect::<Vec<_>>()
            .join(" / ");
        let stdin = std::io::stdin();
        loop {
            print!("{question} {menu}: ");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return Choice::Quit,
                Ok(_) => {}
            }
            let reply = line.trim().to_ascii_lowercase();
            let picked = choices.iter().find(|c| {
                reply == c.label() || (reply.len() == 1 && reply.starts_with(c.hotkey()))
            });
            match picked {
                Some(c) => return *c,
                None => println!("unrecognized answer '{reply}'"),
            }
        }
    }
}

/// Test prompter driven by a pre-programmed list of answers; an exhausted
/// script answers `Quit`.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Choice>,
    pub shown: Vec<String>,
    pub questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Choice>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            shown: Vec::new(),
            questions: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }

    fn ask(&mut self, question: &str, _choices: &[Choice]) -> Choice {
        self.questions.push(question.to_string());
        self.answers.pop_front().unwrap_or(Choice::Quit)
    }
}
