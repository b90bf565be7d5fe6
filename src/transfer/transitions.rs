//! Transition Tables
//!
//! Legal moves for both state machines, plus the two cascade directions:
//!
//! ```text
//! request -> items : ITEM_SIDE_EFFECTS (applied when the request enters a status)
//! items -> request : derive_request_status (applied after an item update)
//! ```
//!
//! Tables are plain data so legality is one lookup and every pair can be
//! enumerated in tests.

use super::state::{ItemStatus, ItemStatus as I, TransferStatus, TransferStatus as T};

/// Transfer-level table: current -> allowed next
pub const TRANSFER_TRANSITIONS: &[(TransferStatus, &[TransferStatus])] = &[
    (T::Draft, &[T::PendingApproval, T::Cancelled]),
    (T::PendingApproval, &[T::Approved, T::Rejected, T::Cancelled]),
    (T::Approved, &[T::Picking, T::Cancelled]),
    (T::Picking, &[T::Packing, T::Cancelled, T::Exception]),
    (T::Packing, &[T::ReadyForPickup, T::Cancelled, T::Exception]),
    (T::ReadyForPickup, &[T::InTransit, T::Cancelled, T::Exception]),
    (T::InTransit, &[T::Arrived, T::Exception]),
    (T::Arrived, &[T::Verifying, T::Exception]),
    (T::Verifying, &[T::Completed, T::Exception]),
    (
        T::Exception,
        &[
            T::Picking,
            T::Packing,
            T::ReadyForPickup,
            T::InTransit,
            T::Verifying,
            T::Completed,
            T::Cancelled,
        ],
    ),
    (T::Completed, &[]),
    (T::Cancelled, &[]),
    (T::Rejected, &[]),
];

/// Item-level table: current -> allowed next
pub const ITEM_TRANSITIONS: &[(ItemStatus, &[ItemStatus])] = &[
    (I::Pending, &[I::Picking, I::Cancelled]),
    (I::Picking, &[I::Picked, I::Partial, I::Cancelled, I::Exception]),
    (I::Picked, &[I::Packed, I::Cancelled, I::Exception]),
    (I::Packed, &[I::InTransit, I::Cancelled, I::Exception]),
    (I::InTransit, &[I::Arrived, I::Exception]),
    (I::Arrived, &[I::Verifying, I::Exception]),
    (I::Verifying, &[I::Completed, I::Partial, I::Exception]),
    (
        I::Exception,
        &[
            I::Picking,
            I::Picked,
            I::Packed,
            I::InTransit,
            I::Arrived,
            I::Verifying,
            I::Completed,
            I::Partial,
            I::Cancelled,
        ],
    ),
    (I::Partial, &[I::Completed, I::Exception]),
    (I::Completed, &[]),
    (I::Cancelled, &[]),
];

/// Uniform item status -> request status it promotes to.
/// PARTIAL has no counterpart.
pub const CASCADE_COUNTERPARTS: &[(ItemStatus, TransferStatus)] = &[
    (I::Picked, T::Packing),
    (I::Packed, T::ReadyForPickup),
    (I::InTransit, T::InTransit),
    (I::Arrived, T::Verifying),
    (I::Completed, T::Completed),
    (I::Cancelled, T::Cancelled),
    (I::Exception, T::Exception),
];

/// Item moves triggered when the request enters a status.
#[derive(Debug, Clone, Copy)]
pub struct ItemSideEffect {
    /// Request status that triggers the move
    pub on: TransferStatus,
    /// Item statuses that move
    pub eligible: &'static [ItemStatus],
    /// Item status they move to
    pub to: ItemStatus,
}

pub const ITEM_SIDE_EFFECTS: &[ItemSideEffect] = &[
    ItemSideEffect {
        on: T::Approved,
        eligible: &[I::Pending],
        to: I::Picking,
    },
    ItemSideEffect {
        on: T::InTransit,
        eligible: &[I::Picked, I::Packed],
        to: I::InTransit,
    },
    ItemSideEffect {
        on: T::Arrived,
        eligible: &[I::InTransit],
        to: I::Arrived,
    },
    // Everything not yet terminal
    ItemSideEffect {
        on: T::Completed,
        eligible: &[
            I::Pending,
            I::Picking,
            I::Picked,
            I::Partial,
            I::Packed,
            I::InTransit,
            I::Arrived,
            I::Verifying,
            I::Exception,
        ],
        to: I::Completed,
    },
    // Everything except COMPLETED
    ItemSideEffect {
        on: T::Cancelled,
        eligible: &[
            I::Pending,
            I::Picking,
            I::Picked,
            I::Partial,
            I::Packed,
            I::InTransit,
            I::Arrived,
            I::Verifying,
            I::Exception,
        ],
        to: I::Cancelled,
    },
];

/// Next states reachable from `from` at transfer level
pub fn transfer_targets(from: TransferStatus) -> &'static [TransferStatus] {
    TRANSFER_TRANSITIONS
        .iter()
        .find(|(current, _)| *current == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

#[inline]
pub fn can_transition(from: TransferStatus, to: TransferStatus) -> bool {
    transfer_targets(from).contains(&to)
}

/// Next states reachable from `from` at item level
pub fn item_targets(from: ItemStatus) -> &'static [ItemStatus] {
    ITEM_TRANSITIONS
        .iter()
        .find(|(current, _)| *current == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

#[inline]
pub fn can_transition_item(from: ItemStatus, to: ItemStatus) -> bool {
    item_targets(from).contains(&to)
}

/// Request-level counterpart of a uniform item status
pub fn cascade_counterpart(status: ItemStatus) -> Option<TransferStatus> {
    CASCADE_COUNTERPARTS
        .iter()
        .find(|(item, _)| *item == status)
        .map(|(_, transfer)| *transfer)
}

/// Side effect for the request entering `status`, if any
pub fn item_side_effect(status: TransferStatus) -> Option<&'static ItemSideEffect> {
    ITEM_SIDE_EFFECTS.iter().find(|effect| effect.on == status)
}

/// Derive the request status implied by its items.
///
/// Returns `Some` only when every item shares one status that has a
/// request-level counterpart. Empty input derives nothing.
pub fn derive_request_status<S>(statuses: S) -> Option<TransferStatus>
where
    S: IntoIterator<Item = ItemStatus>,
{
    let mut statuses = statuses.into_iter();
    let first = statuses.next()?;
    if statuses.all(|status| status == first) {
        cascade_counterpart(first)
    } else {
        None
    }
}
