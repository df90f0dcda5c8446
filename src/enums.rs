//! Typed decoding of enumerated string values.
//!
//! The record `type` discriminator and every "choice" field go through the
//! same decoder, so an unrecognised value always surfaces as
//! [`RecordError::UnknownEnumValue`] carrying the full list of legal values.

use std::fmt;

use crate::error::RecordError;

/// Check `value` against the legal values of `field` and return its
/// position in `allowed`.
///
/// # Errors
///
/// Returns `RecordError::UnknownEnumValue` when `value` is not one of `allowed`.
pub fn decode_choice<S: AsRef<str>>(
    field: &str,
    value: &str,
    allowed: &[S],
) -> Result<usize, RecordError> {
    allowed
        .iter()
        .position(|candidate| candidate.as_ref() == value)
        .ok_or_else(|| RecordError::UnknownEnumValue {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed.iter().map(|s| s.as_ref().to_string()).collect(),
        })
}

/// A closed set of wire strings represented as a Rust enum.
pub trait Choice: Sized + Copy + 'static {
    /// Every variant, in declaration order.
    const VARIANTS: &'static [Self];

    /// The wire string for this variant.
    fn as_str(&self) -> &'static str;

    /// Wire strings of every variant.
    fn names() -> Vec<&'static str> {
        Self::VARIANTS.iter().map(|v| v.as_str()).collect()
    }

    /// Decode a wire string for `field`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::UnknownEnumValue` for strings outside the set.
    fn decode(field: &str, value: &str) -> Result<Self, RecordError> {
        decode_choice(field, value, &Self::names()).map(|index| Self::VARIANTS[index])
    }
}

macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl Choice for $name {
            const VARIANTS: &'static [Self] = &[$($name::$variant,)+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum! {
    /// Virtual attribute subtypes understood by the built-in table.
    pub enum VirtualAttributeType {
        Mirror => "mirror",
        EntryChecksum => "entry-checksum",
        MemberOfServerGroup => "member-of-server-group",
        Constructed => "constructed",
        IsMemberOf => "is-member-of",
        PasswordPolicyStateJson => "password-policy-state-json",
        SubschemaSubentry => "subschema-subentry",
        DnJoin => "dn-join",
        ReverseDnJoin => "reverse-dn-join",
        IdentifyReferences => "identify-references",
        UserDefined => "user-defined",
        EntryDn => "entry-dn",
        EqualityJoin => "equality-join",
        GroovyScripted => "groovy-scripted",
        InstanceName => "instance-name",
        ReplicationStateDetail => "replication-state-detail",
        Member => "member",
        ThirdParty => "third-party",
        NumSubordinates => "num-subordinates",
        HasSubordinates => "has-subordinates",
        ShortUniqueId => "short-unique-id",
    }
}

choice_enum! {
    /// How virtual values interact with real values of the same attribute.
    pub enum ConflictBehavior {
        VirtualOverridesReal => "virtual-overrides-real",
        RealOverridesVirtual => "real-overrides-virtual",
        MergeRealAndVirtual => "merge-real-and-virtual",
    }
}

choice_enum! {
    pub enum JoinScope {
        BaseObject => "base-object",
        OneLevel => "one-level",
        Subtree => "subtree",
        SubordinateSubtree => "subordinate-subtree",
    }
}

choice_enum! {
    pub enum JoinBaseDnType {
        UseSearchBaseDn => "use-search-base-dn",
        UseSourceEntryDn => "use-source-entry-dn",
        UseCustomBaseDn => "use-custom-base-dn",
    }
}

choice_enum! {
    /// Behavior when several virtual attributes target the same attribute type.
    pub enum MergeBehavior {
        EnforceUniqueness => "enforce-uniqueness",
        MergeValues => "merge-values",
        UseFirstValues => "use-first-values",
    }
}
