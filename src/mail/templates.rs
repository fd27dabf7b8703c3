use askama::Template;

use super::{MailError, OutgoingMail};

#[derive(Template)]
#[template(path = "mail/new_post.html")]
pub struct NewPostEmail<'a> {
    pub author_name: &'a str,
    pub author_avatar: &'a str,
    pub post_link: &'a str,
    pub post_image: &'a str,
    pub post_title: &'a str,
    pub post_description: &'a str,
    pub post_date: &'a str,
}

#[derive(Template)]
#[template(path = "mail/otp.html")]
pub struct OtpEmail<'a> {
    pub otp: &'a str,
}

#[derive(Template)]
#[template(path = "mail/admin_request.html")]
pub struct AdminRequestEmail<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub reason: &'a str,
}

impl NewPostEmail<'_> {
    /// One message to every subscriber, all hidden as BCC.
    pub fn to_mail(&self, subscribers: Vec<String>) -> Result<OutgoingMail, MailError> {
        Ok(OutgoingMail {
            to: Vec::new(),
            bcc: subscribers,
            subject: format!("New post from {}: {}", self.author_name, self.post_title),
            html: self.render()?,
        })
    }
}

impl OtpEmail<'_> {
    pub fn to_mail(&self, recipient: &str) -> Result<OutgoingMail, MailError> {
        Ok(OutgoingMail {
            to: vec![recipient.to_string()],
            bcc: Vec::new(),
            subject: "Your verification code".to_string(),
            html: self.render()?,
        })
    }
}

impl AdminRequestEmail<'_> {
    pub fn to_mail(&self, admin_address: &str) -> Result<OutgoingMail, MailError> {
        Ok(OutgoingMail {
            to: vec![admin_address.to_string()],
            bcc: Vec::new(),
            subject: "Request to become admin".to_string(),
            html: self.render()?,
        })
    }
}
