// src/inventory/levels.rs
// Quantity arithmetic for a single stock item.
//
// Every quantity change goes through `StockLevels`. Available stock is never
// stored independently here: it is always `quantity - reserved`.

use crate::error::AppError;

pub const INSUFFICIENT_STOCK: &str = "Insufficient available stock";
pub const INSUFFICIENT_STOCK_FOR_TRANSFER: &str = "Insufficient available stock for transfer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevels {
    pub quantity: i32,
    pub reserved: i32,
}

/// Which timestamp a change touches on the stock item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
    Unchanged,
}

impl StockLevels {
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved
    }

    /// IN / RETURN / transfer destination.
    pub fn receive(self, delta: i32) -> Result<Self, AppError> {
        ensure_positive(delta)?;
        let quantity = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| AppError::validation("Quantity exceeds the supported stock range"))?;
        Ok(Self { quantity, ..self })
    }

    /// OUT / DAMAGE / transfer source.
    pub fn issue(self, delta: i32, insufficient: &str) -> Result<Self, AppError> {
        ensure_positive(delta)?;
        if self.available() < delta {
            return Err(AppError::insufficient_stock(insufficient));
        }
        Ok(Self {
            quantity: self.quantity - delta,
            ..self
        })
    }

    /// ADJUSTMENT: `target` is the new absolute quantity, not a change amount.
    pub fn adjust_to(self, target: i32) -> Result<Self, AppError> {
        ensure_positive(target)?;
        if target < self.reserved {
            return Err(AppError::NegativeAvailableStock);
        }
        Ok(Self {
            quantity: target,
            ..self
        })
    }

    pub fn reserve(self, delta: i32) -> Result<Self, AppError> {
        ensure_positive(delta)?;
        if self.available() < delta {
            return Err(AppError::insufficient_stock(INSUFFICIENT_STOCK));
        }
        Ok(Self {
            reserved: self.reserved + delta,
            ..self
        })
    }

    pub fn release(self, delta: i32) -> Result<Self, AppError> {
        ensure_positive(delta)?;
        if self.reserved < delta {
            return Err(AppError::validation(
                "Cannot release more than reserved quantity",
            ));
        }
        Ok(Self {
            reserved: self.reserved - delta,
            ..self
        })
    }

    pub fn direction_to(&self, next: &StockLevels) -> Direction {
        match next.quantity.cmp(&self.quantity) {
            std::cmp::Ordering::Greater => Direction::Inbound,
            std::cmp::Ordering::Less => Direction::Outbound,
            std::cmp::Ordering::Equal => Direction::Unchanged,
        }
    }
}

pub fn ensure_positive(quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::invalid_quantity(
            "Quantity must be a positive integer",
        ));
    }
    Ok(())
}

/// Narrow a request quantity to the stored integer width.
pub fn checked_quantity(raw: i64) -> Result<i32, AppError> {
    let quantity = i32::try_from(raw)
        .map_err(|_| AppError::invalid_quantity("Quantity is out of range"))?;
    ensure_positive(quantity)?;
    Ok(quantity)
}
