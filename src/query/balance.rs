use std::collections::BTreeMap;

use crate::{
    error::Error,
    ledger::types::{Amount, TxOut, XOnlyKey},
};

use super::QueryContext;

/// Sums the token amounts of a set of outputs per token. Tokens without outputs in the set are
/// absent from the result.
pub fn group_balances(utxos: &[TxOut]) -> Result<BTreeMap<XOnlyKey, Amount>, Error> {
    let mut balances = BTreeMap::<XOnlyKey, Amount>::new();

    for token in utxos.iter().filter_map(|u| u.token.as_ref()) {
        let balance = balances.entry(token.token_pubkey).or_default();

        *balance = balance
            .checked_add(token.amount)
            .ok_or(Error::AmountOverflow("balance"))?;
    }

    Ok(balances)
}

/// Balance of a single token within a set of outputs, zero when the token is absent
pub fn balance_of(utxos: &[TxOut], token_pubkey: &XOnlyKey) -> Result<Amount, Error> {
    Ok(group_balances(utxos)?
        .get(token_pubkey)
        .copied()
        .unwrap_or_default())
}

impl QueryContext<'_> {
    pub fn balances_by_owner_address(
        &self,
        address: &str,
    ) -> Result<BTreeMap<XOnlyKey, Amount>, Error> {
        match self.resolve_owner(address, None)? {
            Some((owner, _)) => group_balances(&self.all_utxos_by_owner(&owner, None)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn balance_by_owner_address(&self, address: &str, token: &str) -> Result<Amount, Error> {
        match self.resolve_owner(address, Some(token))? {
            Some((owner, Some(token_pubkey))) => balance_of(
                &self.all_utxos_by_owner(&owner, Some(&token_pubkey))?,
                &token_pubkey,
            ),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::tables::{TokenInfoByIdKV, TxOutByRefKV},
        testing::TestLedger,
    };

    #[test]
    fn groups_by_token_and_ignores_plain_outputs() {
        let ledger = TestLedger::new();
        let a = ledger.token_info(1, 1);
        let b = ledger.token_info(2, 1);

        let mut plain = ledger.token_output(9, 0, 1, &a, 5, 1);
        plain.token = None;

        let utxos = vec![
            ledger.token_output(1, 0, 1, &a, 10, 1),
            ledger.token_output(2, 0, 1, &b, 3, 1),
            ledger.token_output(3, 0, 1, &a, u128::from(u64::MAX) + 1, 1),
            plain,
        ];

        let balances = group_balances(&utxos).unwrap();

        assert_eq!(balances.len(), 2);
        assert_eq!(balances[&a.token_pubkey], u128::from(u64::MAX) + 11);
        assert_eq!(balances[&b.token_pubkey], 3);
        assert_eq!(balance_of(&utxos, &[0; 32]).unwrap(), 0);
        assert!(group_balances(&[]).unwrap().is_empty());
    }

    #[test]
    fn overflow_is_an_error() {
        let ledger = TestLedger::new();
        let a = ledger.token_info(1, 1);

        let utxos = vec![
            ledger.token_output(1, 0, 1, &a, u128::MAX, 1),
            ledger.token_output(2, 0, 1, &a, 1, 1),
        ];

        assert!(matches!(
            group_balances(&utxos),
            Err(Error::AmountOverflow(_))
        ));
    }

    #[test]
    fn balances_by_address() {
        let ledger = TestLedger::new();
        let a = ledger.token_info(1, 1);
        let b = ledger.token_info(2, 1);

        ledger.write(|task| TokenInfoByIdKV::insert(task, a.clone()));
        ledger.write(|task| TokenInfoByIdKV::insert(task, b.clone()));
        ledger.write(|task| {
            TxOutByRefKV::insert(task, ledger.token_output(1, 0, 1, &a, 10, 1))?;
            TxOutByRefKV::insert(task, ledger.token_output(1, 1, 1, &a, 15, 1))?;
            TxOutByRefKV::insert(task, ledger.token_output(2, 0, 1, &b, 4, 1))?;
            TxOutByRefKV::insert(task, ledger.token_output(3, 0, 2, &b, 99, 1))
        });
        ledger.set_height(1);

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();
        let address = ledger.owner_address(1);

        let balances = ctx.balances_by_owner_address(&address).unwrap();
        assert_eq!(balances[&a.token_pubkey], 25);
        assert_eq!(balances[&b.token_pubkey], 4);

        assert_eq!(ctx.balance_by_owner_address(&address, &b.token_id).unwrap(), 4);
        assert_eq!(ctx.balance_by_owner_address(&address, "nope_1").unwrap(), 0);
        assert_eq!(ctx.balance_by_owner_address("garbage", &a.token_id).unwrap(), 0);
        assert!(ctx.balances_by_owner_address("garbage").unwrap().is_empty());
    }
}
