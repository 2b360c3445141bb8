//! System prompt assembly.

use std::fmt::Write;

use crate::mail::Email;

const PERSONA: &str = "You are a helpful AI email assistant for a venture capital firm.\n\
You have access to the user's emails to answer questions.\n\
Always be professional, concise, and accurate.";

/// Persona, then the guideline block, then one section per context email.
pub fn build_system_prompt(guideline: &str, context: &[Email]) -> String {
    let mut prompt = String::from(PERSONA);

    if !guideline.is_empty() {
        prompt.push_str("\n\nIMPORTANT GUIDELINES:\n");
        prompt.push_str(guideline);
    }

    if !context.is_empty() {
        prompt.push_str("\n\nCONTEXT - The following emails are relevant to the user's query:\n");
        for (index, email) in context.iter().enumerate() {
            let body = email
                .body_text
                .as_deref()
                .or(email.body_html.as_deref())
                .unwrap_or("(No content)");
            let _ = write!(
                prompt,
                "\n--- Email {n} ---\nFrom: {from}\nTo: {to}\nSubject: {subject}\nDate: {date}\nBody: {body}\n",
                n = index + 1,
                from = email.from,
                to = email.to,
                subject = email.subject,
                date = email.sent_at.to_rfc3339(),
            );
        }
        prompt.push_str("\n--- End of Context ---\n");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn email(id: &str, subject: &str, body: Option<&str>) -> Email {
        Email {
            id: id.to_string(),
            message_id: None,
            from: "founder@startup.io".to_string(),
            to: "deals@fundco.com".to_string(),
            cc: None,
            bcc: None,
            subject: subject.to_string(),
            body_text: body.map(str::to_string),
            body_html: None,
            attachments: None,
            sent_at: Utc.with_ymd_and_hms(2026, 8, 18, 9, 30, 0).unwrap(),
            received_at: Utc.with_ymd_and_hms(2026, 8, 18, 9, 30, 0).unwrap(),
            size: 0,
            headers: None,
            is_read: false,
            is_starred: false,
            sender_id: None,
        }
    }

    #[test]
    fn bare_prompt_is_just_the_persona() {
        let prompt = build_system_prompt("", &[]);
        assert!(prompt.starts_with("You are a helpful AI email assistant"));
        assert!(!prompt.contains("IMPORTANT GUIDELINES"));
        assert!(!prompt.contains("CONTEXT"));
    }

    #[test]
    fn guideline_text_is_injected_verbatim() {
        let prompt = build_system_prompt("Always highlight the Ask.", &[]);
        assert!(prompt.contains("IMPORTANT GUIDELINES:\nAlways highlight the Ask."));
    }

    #[test]
    fn context_emails_are_numbered_and_terminated() {
        let context = vec![
            email("1", "Pitch: Ferrule", Some("We raise a seed round.")),
            email("2", "Intro", None),
        ];
        let prompt = build_system_prompt("", &context);

        assert!(prompt.contains("--- Email 1 ---"));
        assert!(prompt.contains("Subject: Pitch: Ferrule"));
        assert!(prompt.contains("Body: We raise a seed round."));
        assert!(prompt.contains("--- Email 2 ---"));
        assert!(prompt.contains("Body: (No content)"));
        assert!(prompt.ends_with("--- End of Context ---\n"));
    }
}
