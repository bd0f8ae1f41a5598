//! Associated-data strings binding envelope-encrypted secrets to their
//! owning field. Encryption and decryption sides must agree on these.

pub fn dsn_aad(slug: &str) -> String {
    format!("tenant:{}:userDb.dsn", slug)
}

pub fn smtp_password_aad(slug: &str) -> String {
    format!("tenant:{}:smtp.password", slug)
}

pub fn social_secret_aad(slug: &str, provider: &str) -> String {
    format!("tenant:{}:social.{}.clientSecret", slug, provider)
}

pub fn client_secret_aad(slug: &str, client_id: &str) -> String {
    format!("tenant:{}:client.{}.secret", slug, client_id)
}
