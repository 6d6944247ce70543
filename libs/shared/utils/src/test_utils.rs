use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

type HmacSha256 = Hmac<Sha256>;

pub struct TestConfig {
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: Option<i64>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            webhook_secret: "pdl_ntfset_test_webhook_secret".to_string(),
            webhook_tolerance_secs: None,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            paddle_webhook_secret: self.webhook_secret.clone(),
            webhook_tolerance_secs: self.webhook_tolerance_secs,
            server_port: 0,
        }
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    pub fn bearer(user: &TestUser, secret: &str) -> String {
        format!("Bearer {}", Self::create_test_token(user, secret, Some(1)))
    }
}

/// Signs webhook bodies the way the payment processor does.
pub struct WebhookTestUtils;

impl WebhookTestUtils {
    pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b":");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn signature_header(secret: &str, timestamp: i64, body: &[u8]) -> String {
        format!("ts={};h1={}", timestamp, Self::sign(secret, timestamp, body))
    }

    pub fn transaction_completed_body(transaction_id: &str, appointment_id: &str) -> Vec<u8> {
        json!({
            "event_type": "transaction.completed",
            "data": {
                "id": transaction_id,
                "custom_data": { "appointmentId": appointment_id }
            }
        })
        .to_string()
        .into_bytes()
    }
}

pub struct MockDocuments;

impl MockDocuments {
    pub fn appointment(id: &str, patient_id: &str, doctor_id: &str, status: &str) -> Value {
        let now = Utc::now().to_rfc3339();
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "scheduled_for": (Utc::now() + Duration::days(2)).to_rfc3339(),
            "status": status,
            "is_paid": false,
            "transaction_id": null,
            "dismissed_by": {},
            "created_at": now,
            "updated_at": now
        })
    }
}
