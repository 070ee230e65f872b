use userhub_events::UserCreated;
use userhub_infra::EmailMessage;

pub const WELCOME_SUBJECT: &str = "Welcome to Our Platform!";

/// Welcome message for a newly registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeEmail {
    pub to: String,
    pub name: String,
}

impl WelcomeEmail {
    pub fn for_user(event: &UserCreated) -> Self {
        Self {
            to: event.email.clone(),
            name: event.name.clone(),
        }
    }

    pub fn render(&self) -> EmailMessage {
        EmailMessage {
            to: self.to.clone(),
            subject: WELCOME_SUBJECT.to_string(),
            html_body: format!(
                "<h1>{WELCOME_SUBJECT}</h1>\n\
                 <p>Dear {},</p>\n\
                 <p>Thank you for registering with us. We're excited to have you on board!</p>\n\
                 <p>If you have any questions, feel free to reach out to our support team.</p>\n\
                 <p>Best regards,<br>Your App Team</p>\n",
                escape_html(&self.name)
            ),
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use userhub_core::UserId;

    use super::*;

    fn event(name: &str) -> UserCreated {
        UserCreated {
            id: UserId::new(1),
            name: name.to_string(),
            email: "ada@x.com".to_string(),
        }
    }

    #[test]
    fn renders_subject_recipient_and_greeting() {
        let message = WelcomeEmail::for_user(&event("Ada")).render();

        assert_eq!(message.to, "ada@x.com");
        assert_eq!(message.subject, "Welcome to Our Platform!");
        assert!(message.html_body.contains("<p>Dear Ada,</p>"));
    }

    #[test]
    fn name_is_html_escaped() {
        let message = WelcomeEmail::for_user(&event("<b>Eve</b> & co")).render();

        assert!(message.html_body.contains("Dear &lt;b&gt;Eve&lt;/b&gt; &amp; co,"));
        assert!(!message.html_body.contains("<b>Eve"));
    }
}
