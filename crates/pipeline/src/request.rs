//! The client-submitted petition request.

use serde::{Deserialize, Serialize};

use crate::{ClientId, PetitionType};

/// Everything a client supplies to have one petition drafted.
///
/// Immutable once submitted: the pipeline only ever borrows it. Field names
/// accept both the English form and the Portuguese form used by the intake
/// forms (`tipo`, `fatos`, `argumentos`, `pedidos`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionRequest {
    /// Which kind of petition to draft; selects the generator agent.
    #[serde(alias = "tipo")]
    pub petition_type: PetitionType,

    /// Facts of the case as told by the client.
    #[serde(default, alias = "fatos")]
    pub facts: String,

    /// Legal arguments the client wants raised.
    #[serde(default, alias = "argumentos")]
    pub arguments: String,

    /// Relief requested from the authority.
    #[serde(default, alias = "pedidos")]
    pub requested_relief: String,

    #[serde(default, alias = "cliente_id")]
    pub client_id: Option<ClientId>,

    #[serde(default, alias = "cliente_nome")]
    pub client_name: Option<String>,

    /// CNPJ or CPF of the client.
    #[serde(default, alias = "cliente_cnpj")]
    pub tax_id: Option<String>,

    /// Reference of the administrative process or bid (e.g. `"Pregão Eletrônico nº 001/2024"`).
    #[serde(default, alias = "referencia_processo")]
    pub process_reference: Option<String>,

    /// Authority the petition is addressed to.
    #[serde(default, alias = "autoridade")]
    pub authority: Option<String>,

    #[serde(default, alias = "cidade")]
    pub city: Option<String>,
}

impl PetitionRequest {
    /// Creates a request with only the petition type set.
    pub fn new(petition_type: PetitionType) -> Self {
        Self {
            petition_type,
            facts: String::new(),
            arguments: String::new(),
            requested_relief: String::new(),
            client_id: None,
            client_name: None,
            tax_id: None,
            process_reference: None,
            authority: None,
            city: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_portuguese_field_names() {
        let request: PetitionRequest = serde_json::from_value(serde_json::json!({
            "tipo": "recurso_administrativo",
            "fatos": "X",
            "argumentos": "Y",
            "pedidos": "Z",
            "cliente_id": "c1",
            "cliente_nome": "Empresa ABC Ltda.",
            "cidade": "São Paulo"
        }))
        .unwrap();

        assert_eq!(request.petition_type.as_str(), "recurso_administrativo");
        assert_eq!(request.facts, "X");
        assert_eq!(request.arguments, "Y");
        assert_eq!(request.requested_relief, "Z");
        assert_eq!(request.client_id.as_ref().map(|c| c.as_str()), Some("c1"));
        assert_eq!(request.city.as_deref(), Some("São Paulo"));
        assert!(request.tax_id.is_none());
    }

    #[test]
    fn only_the_petition_type_is_mandatory() {
        let err = serde_json::from_value::<PetitionRequest>(serde_json::json!({ "fatos": "X" }));
        assert!(err.is_err());

        let request: PetitionRequest =
            serde_json::from_value(serde_json::json!({ "petition_type": "mandado_seguranca" }))
                .unwrap();
        assert!(request.facts.is_empty());
    }
}
