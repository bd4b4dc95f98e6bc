// Signal Fusion Engine
//
// Concept: Fuse name/industry text/address/phone/email signals into one
// typed classification decision with confidence and audit trail.
// Synchronization: consumes LexiconMatch / PhoneResolution, outputs FusionResult
//
// Industry: one lexicon pass over name + industry text + email.
// Region: evaluate every candidate, keep the best by confidence. Acceptance
// rules reproduce the historical precedence:
// 1. Address             - always accepted when it matches
// 2. Name                - accepted only above NAME_REGION_FLOOR
// 3. Phone               - accepted only if the best so far is below PHONE_REGION_CEILING
// 4. Email domain        - accepted only if the best so far is below EMAIL_REGION_CEILING
// A later candidate replaces the current best only with strictly greater confidence.

use super::lexicon::{LexiconMatch, LexiconTable};
use super::phone_region::PhoneRegionResolver;
use crate::types::{ClassificationSignal, FacilityDraft, FusionResult, SignalAxis, SignalSource};
use fid_common::config::ClassificationConfig;

/// Name-derived region must exceed this to be accepted
pub const NAME_REGION_FLOOR: f64 = 0.5;
/// Phone region is only accepted while the best candidate is below this
pub const PHONE_REGION_CEILING: f64 = 0.5;
/// Email region is only accepted while the best candidate is below this
pub const EMAIL_REGION_CEILING: f64 = 0.4;

/// Fusion engine (pure; safe to share across concurrent callers)
#[derive(Debug, Clone)]
pub struct SignalFusionEngine {
    industry_table: LexiconTable,
    region_table: LexiconTable,
    phone_resolver: PhoneRegionResolver,
    config: ClassificationConfig,
}

impl SignalFusionEngine {
    pub fn new(
        industry_table: LexiconTable,
        region_table: LexiconTable,
        phone_resolver: PhoneRegionResolver,
        config: ClassificationConfig,
    ) -> Self {
        Self {
            industry_table,
            region_table,
            phone_resolver,
            config,
        }
    }

    /// Infer industry and region for a draft; never fails
    pub fn infer(&self, draft: &FacilityDraft) -> FusionResult {
        let mut signals = Vec::new();

        let (industry_code, industry_confidence) = self.infer_industry(draft, &mut signals);
        let (region_code, region_confidence) = self.infer_region(draft, &mut signals);

        let overall_confidence = FusionResult::overall_confidence(industry_confidence, region_confidence);
        let needs_confirmation = overall_confidence < self.config.confidence_threshold;

        tracing::info!(
            industry = %industry_code,
            region = %region_code,
            industry_confidence,
            region_confidence,
            overall_confidence,
            needs_confirmation,
            signals = signals.len(),
            "Classification fused"
        );

        FusionResult {
            industry_code,
            region_code,
            industry_confidence,
            region_confidence,
            overall_confidence,
            signals_used: signals,
            needs_confirmation,
        }
    }

    fn infer_industry(&self, draft: &FacilityDraft, signals: &mut Vec<ClassificationSignal>) -> (String, f64) {
        let fields = [
            (SignalSource::Name, text_of(&draft.name)),
            (SignalSource::IndustryText, text_of(&draft.industry_text)),
            (SignalSource::EmailDomain, text_of(&draft.email)),
        ];

        let combined = fields
            .iter()
            .map(|(_, text)| *text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let found = self.industry_table.match_text(
            &combined,
            &self.config.default_industry_code,
            self.config.default_industry_confidence,
        );

        // Attribute the signal to the first field holding a matched keyword,
        // else to the first non-empty field
        let source_kind = fields
            .iter()
            .find(|(_, text)| {
                let lower = text.to_lowercase();
                found.matched_keywords.iter().any(|k| lower.contains(k.as_str()))
            })
            .or_else(|| fields.iter().find(|(_, text)| !text.is_empty()))
            .map(|(source, _)| *source)
            .unwrap_or(SignalSource::IndustryText);

        let reasoning = if found.is_match() {
            format!(
                "industry {}{} matched [{}] at {:.2}",
                found.code,
                label_suffix(&self.industry_table, &found.code),
                found.matched_keywords.join(", "),
                found.confidence
            )
        } else if combined.is_empty() {
            format!(
                "no name, industry text or email; default industry {} at {:.2}",
                found.code, found.confidence
            )
        } else {
            format!(
                "no industry keywords matched; default industry {} at {:.2}",
                found.code, found.confidence
            )
        };

        signals.push(ClassificationSignal {
            source_kind,
            axis: SignalAxis::Industry,
            raw_text: combined,
            matched_keywords: found.matched_keywords.clone(),
            code: found.code.clone(),
            confidence: found.confidence,
            accepted: found.is_match(),
            reasoning,
        });

        (found.code, found.confidence)
    }

    fn infer_region(&self, draft: &FacilityDraft, signals: &mut Vec<ClassificationSignal>) -> (String, f64) {
        let mut best: Option<(String, f64)> = None;

        // 1. Address
        let address = text_of(&draft.address);
        if !address.is_empty() {
            let found = self.match_region(address);
            let accepted = found.is_match();
            let reasoning = if accepted {
                self.region_reasoning("address", &found)
            } else {
                "address: no region keywords".to_string()
            };
            self.record_region(signals, &mut best, SignalSource::Address, address, found, accepted, reasoning);
        }

        // 2. Facility name
        let name = text_of(&draft.name);
        if !name.is_empty() {
            let found = self.match_region(name);
            let accepted = found.is_match() && found.confidence > NAME_REGION_FLOOR;
            let reasoning = if !found.is_match() {
                "name: no region keywords".to_string()
            } else if accepted {
                self.region_reasoning("name", &found)
            } else {
                format!(
                    "name: {} at {:.2} rejected, must exceed {:.2}",
                    found.code, found.confidence, NAME_REGION_FLOOR
                )
            };
            self.record_region(signals, &mut best, SignalSource::Name, name, found, accepted, reasoning);
        }

        // 3. Phone
        let phone = text_of(&draft.phone);
        if !phone.is_empty() {
            let resolved = self.phone_resolver.resolve(phone);
            let prior = best_confidence(&best);
            let accepted = resolved.is_valid() && prior < PHONE_REGION_CEILING;
            let reasoning = if !resolved.is_valid() {
                "phone: not a valid mobile number".to_string()
            } else {
                let mut text = format!(
                    "phone: {} via {:?} at {:.2}",
                    resolved.region_code, resolved.method, resolved.confidence
                );
                if !resolved.alternatives.is_empty() {
                    text.push_str(&format!(" (alternatives: {})", resolved.alternatives.join(", ")));
                }
                if !accepted {
                    text.push_str(&format!(
                        "; skipped, prior candidate at {:.2} >= {:.2}",
                        prior, PHONE_REGION_CEILING
                    ));
                }
                text
            };
            let found = LexiconMatch {
                code: resolved.region_code,
                confidence: resolved.confidence,
                matched_keywords: if resolved.normalized.is_empty() {
                    Vec::new()
                } else {
                    vec![resolved.normalized]
                },
            };
            self.record_region(signals, &mut best, SignalSource::Phone, phone, found, accepted, reasoning);
        }

        // 4. Email domain
        let email = text_of(&draft.email);
        if !email.is_empty() {
            let domain = email_domain(email);
            let found = self.match_region(domain);
            let prior = best_confidence(&best);
            let accepted = found.is_match() && prior < EMAIL_REGION_CEILING;
            let reasoning = if !found.is_match() {
                "email domain: no region keywords".to_string()
            } else if accepted {
                self.region_reasoning("email domain", &found)
            } else {
                format!(
                    "email domain: {} at {:.2} skipped, prior candidate at {:.2} >= {:.2}",
                    found.code, found.confidence, prior, EMAIL_REGION_CEILING
                )
            };
            self.record_region(signals, &mut best, SignalSource::EmailDomain, domain, found, accepted, reasoning);
        }

        best.unwrap_or_else(|| {
            tracing::debug!(
                region = %self.config.default_region_code,
                "No region candidate qualified, using fallback"
            );
            (
                self.config.default_region_code.clone(),
                self.config.default_region_confidence,
            )
        })
    }

    fn match_region(&self, text: &str) -> LexiconMatch {
        // Default is never used as a winner: unmatched candidates are rejected
        self.region_table.match_text(
            text,
            &self.config.default_region_code,
            self.config.default_region_confidence,
        )
    }

    fn region_reasoning(&self, origin: &str, found: &LexiconMatch) -> String {
        format!(
            "{}: region {}{} matched [{}] at {:.2}",
            origin,
            found.code,
            label_suffix(&self.region_table, &found.code),
            found.matched_keywords.join(", "),
            found.confidence
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn record_region(
        &self,
        signals: &mut Vec<ClassificationSignal>,
        best: &mut Option<(String, f64)>,
        source_kind: SignalSource,
        raw_text: &str,
        found: LexiconMatch,
        accepted: bool,
        reasoning: String,
    ) {
        if accepted {
            let replace = match best {
                None => true,
                Some((_, current)) => found.confidence > *current,
            };
            if replace {
                *best = Some((found.code.clone(), found.confidence));
            }
        }

        tracing::debug!(source = ?source_kind, accepted, "{}", reasoning);

        signals.push(ClassificationSignal {
            source_kind,
            axis: SignalAxis::Region,
            raw_text: raw_text.to_string(),
            matched_keywords: found.matched_keywords,
            code: found.code,
            confidence: found.confidence,
            accepted,
            reasoning,
        });
    }
}

fn text_of(field: &Option<String>) -> &str {
    field.as_deref().map(str::trim).unwrap_or("")
}

fn best_confidence(best: &Option<(String, f64)>) -> f64 {
    best.as_ref().map(|(_, c)| *c).unwrap_or(0.0)
}

fn label_suffix(table: &LexiconTable, code: &str) -> String {
    table
        .label(code)
        .map(|label| format!(" ({})", label))
        .unwrap_or_default()
}

/// Domain part of an email address (whole text when there is no '@')
pub fn email_domain(email: &str) -> &str {
    email.rsplit_once('@').map(|(_, domain)| domain).unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::phone_region::{PhonePrefixTables, DENSE_CONFIDENCE};
    use fid_common::identifier::is_region_code;

    fn engine() -> SignalFusionEngine {
        let config = ClassificationConfig::default();
        SignalFusionEngine::new(
            LexiconTable::builtin_industry().unwrap(),
            LexiconTable::builtin_region().unwrap(),
            PhoneRegionResolver::new(PhonePrefixTables::builtin().unwrap(), &config.default_region_code),
            config,
        )
    }

    fn engine_with_region_table(region_toml: &str) -> SignalFusionEngine {
        let config = ClassificationConfig::default();
        SignalFusionEngine::new(
            LexiconTable::builtin_industry().unwrap(),
            LexiconTable::from_toml_str(region_toml, is_region_code).unwrap(),
            PhoneRegionResolver::new(PhonePrefixTables::builtin().unwrap(), &config.default_region_code),
            config,
        )
    }

    #[test]
    fn test_empty_draft_degrades_to_defaults() {
        let result = engine().infer(&FacilityDraft::default());

        assert_eq!(result.industry_code, "140");
        assert_eq!(result.region_code, "BJ");
        assert!(result.industry_confidence <= 0.5);
        assert!(result.region_confidence <= 0.5);
        assert!(result.needs_confirmation);
        assert!((result.overall_confidence - 0.42).abs() < 1e-9);
        // Only the industry default is recorded; no region field was evaluated
        assert_eq!(result.signals_for(SignalAxis::Region).count(), 0);
        assert!(result.winning_region_signal().is_none());
    }

    #[test]
    fn test_qingdao_beer_scenario() {
        let draft = FacilityDraft::default()
            .with_name("青岛啤酒股份有限公司")
            .with_address("山东省青岛市市南区");
        let result = engine().infer(&draft);

        assert_eq!(result.industry_code, "151");
        assert!(result.industry_confidence >= 0.9);
        assert_eq!(result.region_code, "SD");
        assert!(result.region_confidence >= 0.9);
        assert!(!result.needs_confirmation);

        let winner = result.winning_region_signal().unwrap();
        assert_eq!(winner.source_kind, SignalSource::Address);

        let industry = result.signals_for(SignalAxis::Industry).next().unwrap();
        assert_eq!(industry.source_kind, SignalSource::Name);
        assert_eq!(industry.matched_keywords, vec!["啤酒".to_string()]);
    }

    #[test]
    fn test_strong_address_beats_phone() {
        // Phone resolves to GD via the dense table at 0.9
        let draft = FacilityDraft::default()
            .with_address("北京市朝阳区建国路88号")
            .with_phone("13802501234");
        let result = engine().infer(&draft);

        assert_eq!(result.region_code, "BJ");
        assert!(result.region_confidence > DENSE_CONFIDENCE);

        let phone = result
            .signals_for(SignalAxis::Region)
            .find(|s| s.source_kind == SignalSource::Phone)
            .unwrap();
        assert_eq!(phone.code, "GD");
        assert!(!phone.accepted);
        assert!(phone.reasoning.contains("skipped"));
    }

    #[test]
    fn test_weak_address_loses_to_phone() {
        let result = engine_with_region_table(
            r#"
            [codes.BJ]
            base_confidence = 0.3
            primary = ["北京"]
            "#,
        )
        .infer(
            &FacilityDraft::default()
                .with_address("北京市朝阳区建国路88号")
                .with_phone("13802501234"),
        );

        assert_eq!(result.region_code, "GD");
        assert_eq!(result.region_confidence, DENSE_CONFIDENCE);
        assert_eq!(
            result.winning_region_signal().unwrap().source_kind,
            SignalSource::Phone
        );

        // The losing address candidate is still on the audit trail
        let address = result
            .signals_for(SignalAxis::Region)
            .find(|s| s.source_kind == SignalSource::Address)
            .unwrap();
        assert!(address.accepted);
        assert_eq!(address.code, "BJ");
    }

    #[test]
    fn test_equal_confidence_keeps_earlier_candidate() {
        let result = engine_with_region_table(
            r#"
            [codes.BJ]
            base_confidence = 0.4
            primary = ["北京"]

            [codes.GD]
            base_confidence = 0.4
            primary = ["guangdong"]
            "#,
        )
        .infer(
            &FacilityDraft::default()
                .with_address("北京市")
                .with_phone("17750000000"), // bucket tier, SD at 0.4
        );

        assert_eq!(result.region_code, "BJ");
    }

    #[test]
    fn test_name_region_requires_floor() {
        let result = engine_with_region_table(
            r#"
            [codes.SD]
            base_confidence = 0.5
            primary = ["青岛"]
            "#,
        )
        .infer(&FacilityDraft::default().with_name("青岛啤酒"));

        // 0.5 does not exceed the floor
        assert_eq!(result.region_code, "BJ");
        assert_eq!(result.region_confidence, 0.3);
        let name = result.signals_for(SignalAxis::Region).next().unwrap();
        assert_eq!(name.source_kind, SignalSource::Name);
        assert!(!name.accepted);
    }

    #[test]
    fn test_strong_name_beats_weak_address() {
        let result = engine_with_region_table(
            r#"
            [codes.BJ]
            base_confidence = 0.3
            primary = ["北京"]

            [codes.SD]
            base_confidence = 0.95
            primary = ["青岛"]
            "#,
        )
        .infer(
            &FacilityDraft::default()
                .with_name("青岛啤酒")
                .with_address("北京市朝阳区建国路88号"),
        );

        assert_eq!(result.region_code, "SD");
        assert_eq!(result.region_confidence, 0.95);
        assert_eq!(
            result.winning_region_signal().unwrap().source_kind,
            SignalSource::Name
        );

        let address = result
            .signals_for(SignalAxis::Region)
            .find(|s| s.source_kind == SignalSource::Address)
            .unwrap();
        assert!(address.accepted);
        assert_eq!(address.code, "BJ");
        assert_eq!(address.confidence, 0.3);
    }

    #[test]
    fn test_name_region_accepted_without_address() {
        let result = engine().infer(&FacilityDraft::default().with_name("青岛啤酒股份有限公司"));
        assert_eq!(result.region_code, "SD");
        assert_eq!(
            result.winning_region_signal().unwrap().source_kind,
            SignalSource::Name
        );
    }

    #[test]
    fn test_phone_coarse_tier_used_when_nothing_else() {
        let result = engine().infer(&FacilityDraft::default().with_phone("131 1234 5678"));
        assert_eq!(result.region_code, "BJ");
        assert_eq!(result.region_confidence, 0.6);
        assert!(result
            .winning_region_signal()
            .unwrap()
            .reasoning
            .contains("alternatives"));
    }

    #[test]
    fn test_email_is_last_resort() {
        let draft = FacilityDraft::default().with_email("sales@guangzhou-foods.com");
        let result = engine().infer(&draft);
        assert_eq!(result.region_code, "GD");
        assert_eq!(
            result.winning_region_signal().unwrap().source_kind,
            SignalSource::EmailDomain
        );

        // A phone at 0.6 blocks the email candidate
        let result = engine().infer(&draft.with_phone("13112345678"));
        assert_eq!(result.region_code, "BJ");
        let email = result
            .signals_for(SignalAxis::Region)
            .find(|s| s.source_kind == SignalSource::EmailDomain)
            .unwrap();
        assert!(!email.accepted);
    }

    #[test]
    fn test_email_contributes_to_industry() {
        let result = engine().infer(&FacilityDraft::default().with_email("info@brewery.cn"));
        assert_eq!(result.industry_code, "151");
        let industry = result.signals_for(SignalAxis::Industry).next().unwrap();
        assert_eq!(industry.source_kind, SignalSource::EmailDomain);
    }

    #[test]
    fn test_invalid_phone_never_qualifies() {
        let result = engine().infer(&FacilityDraft::default().with_phone("12345"));
        assert_eq!(result.region_code, "BJ");
        assert_eq!(result.region_confidence, 0.3);
        let phone = result.signals_for(SignalAxis::Region).next().unwrap();
        assert!(!phone.accepted);
    }

    #[test]
    fn test_overall_uses_weighting() {
        let draft = FacilityDraft::default()
            .with_name("光明乳业")
            .with_address("上海市闵行区");
        let result = engine().infer(&draft);
        let expected = 0.6 * result.industry_confidence + 0.4 * result.region_confidence;
        assert!((result.overall_confidence - expected).abs() < 1e-9);
        assert_eq!(result.industry_code, "144");
        assert_eq!(result.region_code, "SH");
    }

    #[test]
    fn test_email_domain_extraction() {
        assert_eq!(email_domain("a@b.com"), "b.com");
        assert_eq!(email_domain("b.com"), "b.com");
    }
}
