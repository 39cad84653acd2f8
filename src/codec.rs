use std::str::FromStr;

use bitcoin::{
    Address, AddressType,
    address::NetworkUnchecked,
    key::{TweakedPublicKey, XOnlyPublicKey},
};
use serde::Deserialize;
use tracing::debug;

use crate::ledger::types::{OwnerHash, XOnlyKey};

/// Conversion between human-facing addresses and raw key material. Malformed input yields `None`.
pub trait AddressCodec: Send + Sync {
    fn address_to_public_key(&self, address: &str) -> Option<XOnlyKey>;

    fn public_key_to_address(&self, public_key: &XOnlyKey) -> Option<String>;

    fn owner_address_to_hash(&self, address: &str) -> Option<OwnerHash>;
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet4,
    Regtest,
}

impl From<Network> for bitcoin::Network {
    fn from(network: Network) -> Self {
        match network {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            // testnet4 shares the testnet address prefixes
            Network::Testnet4 => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Token and minter keys are shown as taproot addresses, owners are identified by the witness
/// program of their (taproot or segwit v0 key hash) address.
pub struct BitcoinAddressCodec {
    network: bitcoin::Network,
}

impl BitcoinAddressCodec {
    pub fn new(network: Network) -> Self {
        Self {
            network: network.into(),
        }
    }

    fn parse(&self, address: &str) -> Option<Address> {
        let parsed = Address::<NetworkUnchecked>::from_str(address)
            .and_then(|a| a.require_network(self.network))
            .inspect_err(|e| debug!(address, "unable to decode address: {e}"));

        parsed.ok()
    }
}

impl AddressCodec for BitcoinAddressCodec {
    fn address_to_public_key(&self, address: &str) -> Option<XOnlyKey> {
        let address = self.parse(address)?;

        if address.address_type() != Some(AddressType::P2tr) {
            return None;
        }

        let program = address.witness_program()?;
        let key = XOnlyPublicKey::from_slice(program.program().as_bytes()).ok()?;

        Some(key.serialize())
    }

    fn public_key_to_address(&self, public_key: &XOnlyKey) -> Option<String> {
        let key = XOnlyPublicKey::from_slice(public_key).ok()?;

        let address = Address::p2tr_tweaked(
            TweakedPublicKey::dangerous_assume_tweaked(key),
            self.network,
        );

        Some(address.to_string())
    }

    fn owner_address_to_hash(&self, address: &str) -> Option<OwnerHash> {
        let address = self.parse(address)?;

        match address.address_type() {
            Some(AddressType::P2tr) | Some(AddressType::P2wpkh) => address
                .witness_program()
                .map(|p| p.program().as_bytes().to_vec()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // x coordinate of the secp256k1 generator
    const GENERATOR_X: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn generator() -> XOnlyKey {
        hex::decode(GENERATOR_X).unwrap().try_into().unwrap()
    }

    #[test]
    fn taproot_key_round_trips_through_address() {
        let codec = BitcoinAddressCodec::new(Network::Mainnet);

        let address = codec.public_key_to_address(&generator()).unwrap();
        assert!(address.starts_with("bc1p"));

        assert_eq!(codec.address_to_public_key(&address), Some(generator()));
        assert_eq!(
            codec.owner_address_to_hash(&address),
            Some(generator().to_vec())
        );
    }

    #[test]
    fn segwit_v0_owner_hash_is_the_key_hash() {
        let codec = BitcoinAddressCodec::new(Network::Mainnet);

        let pubkey = bitcoin::CompressedPublicKey::from_slice(
            &hex::decode(format!("02{GENERATOR_X}")).unwrap(),
        )
        .unwrap();
        let address = Address::p2wpkh(&pubkey, bitcoin::Network::Bitcoin).to_string();

        let hash = codec.owner_address_to_hash(&address).unwrap();
        assert_eq!(hash.len(), 20);

        // not a token address
        assert_eq!(codec.address_to_public_key(&address), None);
    }

    #[test]
    fn malformed_or_foreign_addresses_decode_to_none() {
        let mainnet = BitcoinAddressCodec::new(Network::Mainnet);
        let regtest = BitcoinAddressCodec::new(Network::Regtest);

        let address = mainnet.public_key_to_address(&generator()).unwrap();

        assert_eq!(regtest.address_to_public_key(&address), None);
        assert_eq!(regtest.owner_address_to_hash(&address), None);
        assert_eq!(mainnet.address_to_public_key("not an address"), None);
        assert_eq!(mainnet.owner_address_to_hash(""), None);
        assert_eq!(mainnet.public_key_to_address(&[0xFF; 32]), None);
    }
}
