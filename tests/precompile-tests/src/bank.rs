//! Bank module through its ERC20 pointer contract

#[cfg(test)]
mod tests {
    use crate::common;
    use alloy::primitives::{address, Address, U256};
    use anyhow::Result;
    use precompile_harness::precompiles::Erc20;
    use precompile_harness::{expect_revert, Signer, SuiteContext};

    const RECEIVER: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");

    struct Bank {
        owner: Signer,
        owner2: Signer,
        erc20: Erc20,
    }

    async fn bank(ctx: &SuiteContext) -> Result<Bank> {
        let owner = ctx.signer(0)?;
        let owner2 = ctx.signer(1)?;
        let erc20 = ctx.erc20(owner.clone())?;
        ctx.associate_once(&owner, &owner2).await?;
        Ok(Bank { owner, owner2, erc20 })
    }

    #[tokio::test]
    #[ignore] // Requires a running node
    async fn test_transfer() -> Result<()> {
        let ctx = common::setup().await?;
        let bank = bank(&ctx).await?;

        let before = bank.erc20.balance_of(bank.owner.address()).await?;
        let receipt = bank
            .erc20
            .transfer(bank.owner2.address(), U256::from(1u64))
            .await?
            .wait()
            .await?;
        assert!(receipt.is_success());

        let after = bank.erc20.balance_of(bank.owner.address()).await?;
        assert_eq!(before - after, U256::from(1u64));
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires a running node
    async fn test_transfer_with_insufficient_balance_fails() -> Result<()> {
        let ctx = common::setup().await?;
        let bank = bank(&ctx).await?;

        expect_revert(bank.erc20.transfer(RECEIVER, U256::from(10_000u64))).await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires a running node
    async fn test_transfer_from_without_approval_fails() -> Result<()> {
        let ctx = common::setup().await?;
        let bank = bank(&ctx).await?;
        let as_owner2 = bank.erc20.connect(bank.owner2.clone());

        expect_revert(as_owner2.transfer_from(bank.owner.address(), RECEIVER, U256::from(100u64))).await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires a running node
    async fn test_approve_and_transfer_from() -> Result<()> {
        let ctx = common::setup().await?;
        let bank = bank(&ctx).await?;
        let (owner, owner2) = (bank.owner.address(), bank.owner2.address());

        assert_eq!(bank.erc20.allowance(owner, owner2).await?, U256::ZERO);
        let approve = bank.erc20.approve(owner2, U256::from(100u64)).await?.wait().await?;
        assert!(approve.is_success());
        assert_eq!(bank.erc20.allowance(owner, owner2).await?, U256::from(100u64));

        let as_owner2 = bank.erc20.connect(bank.owner2.clone());
        let before = bank.erc20.balance_of(owner2).await?;
        let receipt = as_owner2
            .transfer_from(owner, owner2, U256::from(100u64))
            .await?
            .wait()
            .await?;
        assert!(receipt.is_success());

        let after = bank.erc20.balance_of(owner2).await?;
        assert_eq!(after - before, U256::from(100u64));
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires a running node
    async fn test_balance_of() -> Result<()> {
        let ctx = common::setup().await?;
        let bank = bank(&ctx).await?;

        assert!(bank.erc20.balance_of(bank.owner.address()).await? > U256::ZERO);
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires a running node
    async fn test_name_and_symbol() -> Result<()> {
        let ctx = common::setup().await?;
        let erc20 = ctx.erc20(ctx.signer(0)?)?;

        assert_eq!(erc20.name().await?, "UATOM");
        assert_eq!(erc20.symbol().await?, "UATOM");
        Ok(())
    }
}
