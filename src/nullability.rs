use std::collections::BTreeSet;

use crate::config::AnalysisConfig;
use crate::ir::Nullness;

/// Nullability annotations recognized when no configuration overrides them.
pub const DEFAULT_NULLABLE_ANNOTATIONS: &[&str] = &[
    "org.jetbrains.annotations.Nullable",
    "javax.annotation.Nullable",
    "javax.annotation.CheckForNull",
    "org.jspecify.annotations.Nullable",
    "androidx.annotation.Nullable",
    "android.support.annotation.Nullable",
    "org.checkerframework.checker.nullness.qual.Nullable",
];

pub const DEFAULT_NOT_NULL_ANNOTATIONS: &[&str] = &[
    "org.jetbrains.annotations.NotNull",
    "javax.annotation.Nonnull",
    "org.jspecify.annotations.NonNull",
    "androidx.annotation.NonNull",
    "android.support.annotation.NonNull",
    "org.checkerframework.checker.nullness.qual.NonNull",
];

/// Answers nullability questions about annotated declarations.
pub trait NullabilityResolver: Send + Sync {
    fn is_nullable(&self, annotations: &[String]) -> bool;

    fn is_not_null(&self, annotations: &[String]) -> bool;

    /// Nullness of a declaration: owner annotations win, then type-use
    /// annotations of its type in order.
    fn element_nullness(
        &self,
        owner_annotations: &[String],
        type_annotations: &[String],
    ) -> Nullness {
        if self.is_nullable(owner_annotations) {
            return Nullness::Nullable;
        }
        if self.is_not_null(owner_annotations) {
            return Nullness::NonNull;
        }
        for annotation in type_annotations {
            let single = std::slice::from_ref(annotation);
            if self.is_nullable(single) {
                return Nullness::Nullable;
            }
            if self.is_not_null(single) {
                return Nullness::NonNull;
            }
        }
        Nullness::Unknown
    }
}

/// Resolver matching annotations by qualified name.
#[derive(Clone, Debug)]
pub struct AnnotationResolver {
    nullable: BTreeSet<String>,
    not_null: BTreeSet<String>,
}

impl AnnotationResolver {
    pub fn new<N, M>(nullable: N, not_null: M) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            nullable: nullable.into_iter().map(Into::into).collect(),
            not_null: not_null.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.nullable_annotations.iter().cloned(),
            config.not_null_annotations.iter().cloned(),
        )
    }
}

impl Default for AnnotationResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_NULLABLE_ANNOTATIONS.iter().copied(),
            DEFAULT_NOT_NULL_ANNOTATIONS.iter().copied(),
        )
    }
}

impl NullabilityResolver for AnnotationResolver {
    fn is_nullable(&self, annotations: &[String]) -> bool {
        annotations
            .iter()
            .any(|annotation| self.nullable.contains(annotation))
    }

    fn is_not_null(&self, annotations: &[String]) -> bool {
        annotations
            .iter()
            .any(|annotation| self.not_null.contains(annotation))
    }
}
