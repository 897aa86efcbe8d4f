//! Line-based terminal front-end for the onboarding forms.
//!
//! [`drive_form`] walks a [`RegistrationFormController`] field by field: it
//! prompts for whichever field has focus, commits it, prints validation errors
//! and finally submits. Input comes through [`LineInput`] so passwords are read
//! without echo on a real console while tests script every keystroke.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use async_trait::async_trait;
use dialoguer::console::Term;
use tracing::debug;

use guuber_core::{
    AlternateSignInController, FeedbackSink, FormField, FormMode, RegistrationError,
    RegistrationFormController, SubmissionOutcome,
};

/// Terminal bell.
const BELL: &str = "\x07";

/// Feedback sink that rings the terminal bell on every pulse.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalFeedback;

impl FeedbackSink for TerminalFeedback {
    fn pulse(&self, field: FormField, duration: Duration) {
        debug!(field = %field, ?duration, "Feedback pulse");
        let mut stderr = io::stderr();
        let _ = stderr.write_all(BELL.as_bytes());
        let _ = stderr.flush();
    }
}

/// How an interactive form session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormRun {
    /// The form was submitted successfully.
    Completed(SubmissionOutcome),

    /// Input ended or the user quit before a successful submission.
    Abandoned,
}

/// Source of answers typed by the user. `None` means end of input.
pub trait LineInput {
    /// Reads one visible line.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Reads one line that must not be echoed.
    fn read_secret(&mut self) -> io::Result<Option<String>>;
}

/// Answers read from any buffered reader, echo and all.
#[derive(Debug)]
pub struct ScriptedInput<R>(pub R);

impl<R: BufRead> LineInput for ScriptedInput<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_line(&mut self.0)
    }

    fn read_secret(&mut self) -> io::Result<Option<String>> {
        read_line(&mut self.0)
    }
}

/// Standard input. Secrets are read with echo off when stdin is a terminal.
#[derive(Debug, Default)]
pub struct ConsoleInput;

impl LineInput for ConsoleInput {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_line(&mut io::stdin().lock())
    }

    fn read_secret(&mut self) -> io::Result<Option<String>> {
        let term = Term::stderr();
        if term.is_term() {
            term.read_secure_line().map(Some)
        } else {
            self.read_line()
        }
    }
}

/// Sends a filled-in form to wherever it belongs.
#[async_trait(?Send)]
pub trait FormSubmitter {
    async fn submit_form(
        &mut self,
        form: &mut RegistrationFormController,
    ) -> guuber_core::Result<SubmissionOutcome>;
}

/// Submits the form through its own gateway.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSubmit;

#[async_trait(?Send)]
impl FormSubmitter for DirectSubmit {
    async fn submit_form(
        &mut self,
        form: &mut RegistrationFormController,
    ) -> guuber_core::Result<SubmissionOutcome> {
        form.submit().await
    }
}

#[async_trait(?Send)]
impl FormSubmitter for AlternateSignInController {
    async fn submit_form(
        &mut self,
        form: &mut RegistrationFormController,
    ) -> guuber_core::Result<SubmissionOutcome> {
        self.submit_completion_form(form).await
    }
}

/// Reads one line, without its line terminator. `None` at end of input.
pub fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

/// Prints `label` and reads the answer.
pub fn prompt<I: LineInput, W: Write>(
    input: &mut I,
    output: &mut W,
    label: &str,
) -> io::Result<Option<String>> {
    write!(output, "{label}: ")?;
    output.flush()?;
    input.read_line()
}

/// Prints `label` and reads the answer without echoing it.
pub fn prompt_secret<I: LineInput, W: Write>(
    input: &mut I,
    output: &mut W,
    label: &str,
) -> io::Result<Option<String>> {
    write!(output, "{label}: ")?;
    output.flush()?;
    input.read_secret()
}

/// Prompts for the focused field until `form` is ready for submission.
///
/// Validation errors are printed and the same field is asked again. Returns
/// `false` if input ends first.
///
/// # Errors
///
/// Only I/O errors on `input` or `output`.
pub fn fill_form<I: LineInput, W: Write>(
    form: &mut RegistrationFormController,
    input: &mut I,
    output: &mut W,
) -> io::Result<bool> {
    while !form.is_ready() {
        let field = form.focus();
        let answer = if field.is_secret() {
            prompt_secret(input, output, field.label())?
        } else {
            prompt(input, output, field.label())?
        };
        let Some(value) = answer else {
            return Ok(false);
        };

        form.on_field_changed(field, &value);
        if let Err(err) = form.commit(field) {
            report_rejection(form, output, field, &err)?;
            form.clear_feedback(field);
        }
    }
    Ok(true)
}

/// Reports a failed submission and prepares the form for another attempt.
///
/// When the failure names a field (a taken username, say) that field is
/// emptied so it is asked again, which clears everything after it. Other
/// failures leave the draft unchanged and ask whether to retry. Returns
/// `false` if the user quits.
///
/// # Errors
///
/// Only I/O errors on `input` or `output`.
pub fn recover_from_failure<I: LineInput, W: Write>(
    form: &mut RegistrationFormController,
    input: &mut I,
    output: &mut W,
    err: &RegistrationError,
) -> io::Result<bool> {
    writeln!(output, "  {err}")?;

    if let Some(field) = err.field() {
        form.clear_feedback(field);
        form.on_field_changed(field, "");
        return Ok(true);
    }

    match prompt(input, output, "Press return to retry, or type q to quit")? {
        Some(answer) => Ok(!answer.trim().eq_ignore_ascii_case("q")),
        None => Ok(false),
    }
}

/// Runs `form` interactively and submits it through its own gateway.
///
/// # Errors
///
/// Only I/O errors on `input` or `output`.
pub async fn drive_form<I: LineInput, W: Write>(
    form: &mut RegistrationFormController,
    input: &mut I,
    output: &mut W,
) -> io::Result<FormRun> {
    drive_form_with(form, &mut DirectSubmit, input, output).await
}

/// Runs `form` interactively until `submitter` accepts it or the user gives up.
///
/// # Errors
///
/// Only I/O errors on `input` or `output`.
pub async fn drive_form_with<S, I, W>(
    form: &mut RegistrationFormController,
    submitter: &mut S,
    input: &mut I,
    output: &mut W,
) -> io::Result<FormRun>
where
    S: FormSubmitter + ?Sized,
    I: LineInput,
    W: Write,
{
    if form.mode() == FormMode::CompleteProfile {
        greet_completion(form, output)?;
    }

    loop {
        if !fill_form(form, input, output)? {
            return Ok(FormRun::Abandoned);
        }

        writeln!(output, "Submitting...")?;
        match submitter.submit_form(form).await {
            Ok(outcome) => {
                report_outcome(output, &outcome)?;
                return Ok(FormRun::Completed(outcome));
            }
            Err(err) => {
                if !recover_from_failure(form, input, output, &err)? {
                    return Ok(FormRun::Abandoned);
                }
            }
        }
    }
}

/// Prints the welcome line of a completion form.
pub fn greet_completion<W: Write>(
    form: &RegistrationFormController,
    output: &mut W,
) -> io::Result<()> {
    writeln!(
        output,
        "Welcome {} {}! Pick a username and password to finish signing up.",
        form.value(FormField::FirstName),
        form.value(FormField::LastName)
    )
}

fn report_rejection<W: Write>(
    form: &RegistrationFormController,
    output: &mut W,
    field: FormField,
    err: &RegistrationError,
) -> io::Result<()> {
    writeln!(output, "  {err}")?;

    if field == FormField::Password {
        for (label, met) in form.password_requirements().checklist() {
            let mark = if met { "x" } else { " " };
            writeln!(output, "    [{mark}] {label}")?;
        }
    }
    Ok(())
}

pub fn report_outcome<W: Write>(output: &mut W, outcome: &SubmissionOutcome) -> io::Result<()> {
    match outcome {
        SubmissionOutcome::AccountCreated(record) => writeln!(
            output,
            "Welcome, {}! Your account @{} is ready.",
            record.first_name, record.username
        ),
        SubmissionOutcome::ProfileCompleted { username } => {
            writeln!(output, "All set, @{username}.")
        }
    }
}
