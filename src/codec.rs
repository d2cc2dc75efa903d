use std::sync::Once;

use macaroon::{Caveat, Format, Macaroon};

use crate::error::Error;
use crate::types::{CaveatId, DischargeToken, RootToken};

/// A third-party caveat embedded in a macaroon.
///
/// `caveat_id` is opaque: it is minted by the backend for the discharging
/// party and only round-tripped by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThirdPartyCaveat {
    pub location: String,
    pub caveat_id: CaveatId,
}

fn init_crypto() {
    static INIT: Once = Once::new();
    INIT.call_once(|| macaroon::initialize().expect("macaroon crypto initialization"));
}

/// Decodes a serialized macaroon token.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] if the bytes do not decode as a
/// macaroon in any supported serialization format.
pub fn deserialize(token: &str) -> Result<Macaroon, Error> {
    init_crypto();
    Macaroon::deserialize(token).map_err(|e| Error::MalformedToken(e.to_string()))
}

/// Serializes a macaroon back to its token form.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] if the macaroon cannot be encoded.
pub fn serialize(macaroon: &Macaroon) -> Result<String, Error> {
    init_crypto();
    macaroon
        .serialize(Format::V1)
        .map_err(|e| Error::MalformedToken(e.to_string()))
}

/// Lists the third-party caveats of a macaroon.
#[must_use]
pub fn third_party_caveats(macaroon: &Macaroon) -> Vec<ThirdPartyCaveat> {
    macaroon
        .third_party_caveats()
        .into_iter()
        .filter_map(|caveat| match caveat {
            Caveat::ThirdParty(tp) => Some(ThirdPartyCaveat {
                location: tp.location(),
                caveat_id: CaveatId::from(String::from_utf8_lossy(&tp.id().0).into_owned()),
            }),
            _ => None,
        })
        .collect()
}

/// Selects the single third-party caveat with the given location.
///
/// Zero or multiple matches indicate the issuing backend broke its
/// contract; neither case is recoverable, and this never silently picks
/// one of several candidates.
///
/// # Errors
///
/// Returns [`Error::CaveatCount`] unless exactly one caveat matches.
pub fn select_caveat(macaroon: &Macaroon, location: &str) -> Result<ThirdPartyCaveat, Error> {
    let mut matches: Vec<ThirdPartyCaveat> = third_party_caveats(macaroon)
        .into_iter()
        .filter(|caveat| caveat.location == location)
        .collect();

    if matches.len() == 1 {
        Ok(matches.remove(0))
    } else {
        Err(Error::CaveatCount {
            location: location.to_string(),
            found: matches.len(),
        })
    }
}

/// Extracts the identity provider's caveat id from a serialized root token.
///
/// Convenience for the login flow: decode the root, select the single
/// caveat discharged by `location`, and return its id.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] if the root does not decode, or
/// [`Error::CaveatCount`] if it does not carry exactly one caveat for the
/// location.
pub fn extract_caveat_id(root: &RootToken, location: &str) -> Result<CaveatId, Error> {
    let macaroon = deserialize(root.as_str())?;
    Ok(select_caveat(&macaroon, location)?.caveat_id)
}

/// Binds a discharge macaroon to its root for use in a request context,
/// returning the serialized bound discharge.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] if either token does not decode or
/// the bound macaroon cannot be re-encoded.
pub fn bind_discharge(root: &RootToken, discharge: &DischargeToken) -> Result<String, Error> {
    let root_macaroon = deserialize(root.as_str())?;
    let mut discharge_macaroon = deserialize(discharge.as_str())?;
    root_macaroon.bind(&mut discharge_macaroon);
    serialize(&discharge_macaroon)
}

/// Builds the `Authorization` header value for a root + discharge pair.
///
/// The exact format is the wire contract parsed by verification backends:
/// `Macaroon root=<root>, discharge=<bound-discharge>`. The root token is
/// passed through unmodified; the discharge is bound to it first.
///
/// Recomputed for every outbound request — root and discharge may have
/// changed since last use.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] if either token does not decode.
pub fn authorization_header(
    root: &RootToken,
    discharge: &DischargeToken,
) -> Result<String, Error> {
    let bound = bind_discharge(root, discharge)?;
    Ok(format!("Macaroon root={root}, discharge={bound}"))
}
