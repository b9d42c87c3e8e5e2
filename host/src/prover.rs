use async_trait::async_trait;
use guardian_email_core::{CircuitInput, FieldElement, Groth16Proof, Prover, ProverError};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Blueprint proven when none is configured.
pub const DEFAULT_BLUEPRINT: &str = "zkemail/guardian_accept@v1";

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofRequest<'a> {
    blueprint: &'a str,
    raw_email: &'a str,
    external_inputs: &'a [CircuitInput],
}

/// snarkjs layout: points may carry a trailing projective coordinate.
#[derive(Debug, Deserialize)]
struct SnarkjsProof {
    pi_a: Vec<FieldElement>,
    pi_b: Vec<Vec<FieldElement>>,
    pi_c: Vec<FieldElement>,
}

#[derive(Debug, Deserialize)]
struct ProofResponse {
    proof: SnarkjsProof,
    #[serde(rename = "publicSignals", default)]
    public_signals: Vec<FieldElement>,
}

fn affine_pair(
    name: &str,
    mut point: Vec<FieldElement>,
) -> Result<[FieldElement; 2], ProverError> {
    if !(2..=3).contains(&point.len()) {
        return Err(ProverError::MalformedResponse(format!(
            "{name} has {} coordinates",
            point.len()
        )));
    }
    point.truncate(2);
    let y = point.pop();
    let x = point.pop();
    match (x, y) {
        (Some(x), Some(y)) => Ok([x, y]),
        _ => Err(ProverError::MalformedResponse(format!("{name} is incomplete"))),
    }
}

impl TryFrom<ProofResponse> for Groth16Proof {
    type Error = ProverError;

    fn try_from(response: ProofResponse) -> Result<Self, Self::Error> {
        let SnarkjsProof { pi_a, pi_b, pi_c } = response.proof;
        if !(2..=3).contains(&pi_b.len()) {
            return Err(ProverError::MalformedResponse(format!(
                "pi_b has {} rows",
                pi_b.len()
            )));
        }
        let mut rows = pi_b.into_iter();
        let (Some(b0), Some(b1)) = (rows.next(), rows.next()) else {
            return Err(ProverError::MalformedResponse("pi_b is incomplete".into()));
        };
        Ok(Groth16Proof {
            pi_a: affine_pair("pi_a", pi_a)?,
            pi_b: [affine_pair("pi_b[0]", b0)?, affine_pair("pi_b[1]", b1)?],
            pi_c: affine_pair("pi_c", pi_c)?,
            public_signals: response.public_signals,
        })
    }
}

/// Posts the raw email and circuit inputs to a proving service.
pub struct RemoteProver {
    client: Client,
    endpoint: Url,
    blueprint: String,
    api_key: Option<String>,
}

impl RemoteProver {
    pub fn new(endpoint: Url, blueprint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            blueprint: blueprint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Prover for RemoteProver {
    async fn prove(
        &self,
        raw_email: &str,
        inputs: &[CircuitInput],
    ) -> Result<Groth16Proof, ProverError> {
        debug!("Requesting proof for blueprint {} from {}", self.blueprint, self.endpoint);
        let body = ProofRequest {
            blueprint: &self.blueprint,
            raw_email,
            external_inputs: inputs,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProverError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProverError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let payload: ProofResponse = response
            .json()
            .await
            .map_err(|e| ProverError::MalformedResponse(e.to_string()))?;
        info!("Proof received from {}", self.endpoint);
        payload.try_into()
    }
}
