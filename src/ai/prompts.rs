use crate::ai::context::SchemaContext;
use serde_json::Value;

/// The six cross-source questions, each answered by its own completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternPrompt {
    CommonPatterns,
    EntityMappings,
    ArchitecturePatterns,
    IntegrationStrategy,
    PerformanceComparison,
    GovernancePatterns,
}

impl PatternPrompt {
    pub const ALL: [PatternPrompt; 6] = [
        PatternPrompt::CommonPatterns,
        PatternPrompt::EntityMappings,
        PatternPrompt::ArchitecturePatterns,
        PatternPrompt::IntegrationStrategy,
        PatternPrompt::PerformanceComparison,
        PatternPrompt::GovernancePatterns,
    ];

    /// Key under which the answer is stored in the pattern record.
    pub fn key(&self) -> &'static str {
        match self {
            PatternPrompt::CommonPatterns => "common_patterns",
            PatternPrompt::EntityMappings => "entity_mappings",
            PatternPrompt::ArchitecturePatterns => "architecture_patterns",
            PatternPrompt::IntegrationStrategy => "integration_strategy",
            PatternPrompt::PerformanceComparison => "performance_comparison",
            PatternPrompt::GovernancePatterns => "data_governance",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            PatternPrompt::CommonPatterns => COMMON_PATTERNS_INSTRUCTION,
            PatternPrompt::EntityMappings => {
                "Analyze these database analyses and create entity mappings between different implementations:"
            }
            PatternPrompt::ArchitecturePatterns => {
                "Analyze the architectural patterns and design decisions in these database implementations:"
            }
            PatternPrompt::IntegrationStrategy => {
                "Based on these database analyses, create a comprehensive integration strategy:"
            }
            PatternPrompt::PerformanceComparison => {
                "Compare performance characteristics across these database implementations:"
            }
            PatternPrompt::GovernancePatterns => {
                "Analyze data governance, security, and compliance patterns:"
            }
        }
    }

    fn lead_in(&self) -> &'static str {
        match self {
            PatternPrompt::CommonPatterns => {
                "Provide a COMPREHENSIVE reverse engineering analysis in this exact JSON format:"
            }
            PatternPrompt::EntityMappings => {
                "Create a mapping showing how the same business concept is implemented differently:"
            }
            PatternPrompt::ArchitecturePatterns => "Provide analysis focusing on:",
            PatternPrompt::IntegrationStrategy => "Provide detailed integration strategy:",
            PatternPrompt::PerformanceComparison => "Analyze and compare:",
            PatternPrompt::GovernancePatterns => "Focus on:",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            PatternPrompt::CommonPatterns => COMMON_PATTERNS_TEMPLATE,
            PatternPrompt::EntityMappings => ENTITY_MAPPING_TEMPLATE,
            PatternPrompt::ArchitecturePatterns => ARCHITECTURE_TEMPLATE,
            PatternPrompt::IntegrationStrategy => INTEGRATION_TEMPLATE,
            PatternPrompt::PerformanceComparison => PERFORMANCE_TEMPLATE,
            PatternPrompt::GovernancePatterns => GOVERNANCE_TEMPLATE,
        }
    }

    fn closing(&self) -> &'static str {
        match self {
            PatternPrompt::CommonPatterns => COMMON_PATTERNS_CLOSING,
            PatternPrompt::EntityMappings => "Focus on practical mapping for data migration and integration.",
            _ => "",
        }
    }

    /// Renders the prompt around the per-source analyses.
    pub fn render(&self, analyses: &Value) -> String {
        let analyses = serde_json::to_string_pretty(analyses).unwrap_or_default();
        let mut prompt = format!(
            "{}\n\nDatabase Analyses:\n{}\n\n{}\n\n{}\n",
            self.instruction(),
            analyses,
            self.lead_in(),
            self.template()
        );
        if !self.closing().is_empty() {
            prompt.push('\n');
            prompt.push_str(self.closing());
            prompt.push('\n');
        }
        prompt
    }
}

pub fn schema_analysis_prompt(context: &SchemaContext) -> String {
    let detailed = serde_json::to_string_pretty(&context.detailed_schema()).unwrap_or_default();
    format!(
        "You are an expert database reverse engineer and data architect. \
         Perform a DEEP ANALYSIS of this database schema for reverse engineering purposes.\n\n\
         Database Type: {}\n\
         Total Tables: {}\n\
         Detailed Schema: {}\n\n\
         Provide a COMPREHENSIVE analysis in this exact JSON format:\n\n\
         {}\n\n\
         Focus on providing DEEP INSIGHTS that would help engineers understand the data model, \
         business logic, and potential use cases without manual exploration. Be specific about \
         relationships, data patterns, and business rules inferred from the schema structure.\n",
        context.database_type, context.total_tables, detailed, ANALYSIS_TEMPLATE
    )
}

const ANALYSIS_TEMPLATE: &str = r#"{
  "reverse_engineering_analysis": {
    "business_domain_identification": {
      "primary_domain": "e-commerce",
      "sub_domains": ["customer_management", "order_processing", "product_catalog"],
      "confidence_score": 95,
      "domain_evidence": ["Table names like 'orders', 'customers'", "Foreign key relationships"],
      "business_processes": ["Customer registration", "Order placement", "Product management"]
    },
    "data_model_architecture": {
      "design_pattern": "Entity-Relationship Model",
      "normalization_level": "3NF",
      "architectural_style": "Traditional Relational",
      "flexibility_score": 75,
      "scalability_indicators": ["Proper indexing", "Normalized structure"]
    },
    "entity_relationship_mapping": {
      "core_entities": [
        {
          "entity_name": "Customer",
          "table_name": "customers",
          "key_attributes": ["customer_id", "email"],
          "business_purpose": "Store customer information and track customer behavior",
          "data_volume": "Medium",
          "update_frequency": "Low"
        }
      ],
      "relationships": [
        {
          "relationship_name": "Customer-Orders",
          "parent_entity": "Customer",
          "child_entity": "Order",
          "relationship_type": "one-to-many",
          "business_meaning": "A customer can place multiple orders",
          "cardinality": "1:N",
          "foreign_key": "orders.customer_id -> customers.customer_id"
        }
      ],
      "entity_hierarchy": {
        "master_entities": ["Customer", "Product"],
        "transaction_entities": ["Order", "OrderItem"],
        "reference_entities": ["Category", "Status"]
      }
    }
  },
  "metadata_extraction": {
    "table_purposes": {
      "customers": "Primary customer data storage with contact and behavioral information",
      "orders": "Order transaction records with financial and status tracking"
    },
    "column_semantics": {
      "customer_id": "Primary identifier for customer records",
      "email": "Unique customer contact and login identifier"
    },
    "data_patterns": {
      "identifier_patterns": ["Auto-incrementing IDs", "UUID patterns"],
      "naming_conventions": ["snake_case for tables", "camelCase for some columns"],
      "data_type_patterns": ["DECIMAL for monetary values", "TIMESTAMP for dates"]
    },
    "business_rules_inferred": [
      "Customers must have unique email addresses",
      "Orders must be associated with valid customers"
    ]
  },
  "data_quality_assessment": {
    "integrity_analysis": {
      "referential_integrity": "Well-maintained with foreign key constraints",
      "data_consistency": "High - proper normalization",
      "completeness_score": 85,
      "accuracy_indicators": ["Proper data types", "Constraint enforcement"]
    },
    "quality_issues": [
      "Potential missing indexes on frequently queried columns",
      "Some nullable fields that should be required"
    ],
    "data_governance": {
      "pii_handling": "Email addresses stored - consider encryption",
      "audit_trail": "Basic timestamp tracking available",
      "data_retention": "No explicit retention policies visible"
    }
  },
  "performance_analysis": {
    "query_patterns": ["Customer order history lookups", "Order status tracking and updates"],
    "bottleneck_identification": [
      "Large table scans without proper indexing",
      "Complex joins on unindexed foreign keys"
    ],
    "optimization_opportunities": [
      "Add composite indexes for common query patterns",
      "Implement query result caching"
    ],
    "scalability_assessment": {
      "current_capacity": "Medium scale - suitable for small to medium business",
      "scaling_challenges": ["Single database instance", "Limited partitioning"],
      "scaling_recommendations": ["Implement sharding strategy", "Add caching layer"]
    }
  },
  "use_case_analysis": {
    "primary_use_cases": [
      {
        "use_case": "Customer Management",
        "description": "Complete customer lifecycle from registration to order history",
        "data_entities": ["Customer", "Order"],
        "business_value": "Customer relationship management and analytics"
      }
    ],
    "analytics_opportunities": ["Customer behavior analysis", "Sales performance tracking"],
    "integration_points": ["Payment gateway integration", "Inventory management system"]
  },
  "technical_debt_assessment": {
    "immediate_concerns": ["Missing indexes on foreign keys", "No explicit data validation constraints"],
    "medium_term_improvements": ["Implement comprehensive audit logging", "Add data archiving strategy"],
    "long_term_considerations": ["Microservices architecture migration", "Event-driven data architecture"]
  },
  "migration_insights": {
    "complexity_assessment": "Medium complexity - well-structured but needs optimization",
    "migration_effort": "2-3 months for complete migration",
    "risk_factors": ["Data volume", "Downtime requirements"],
    "migration_strategy": "Phased migration with parallel systems"
  }
}"#;

const COMMON_PATTERNS_INSTRUCTION: &str = "You are a senior database architect and reverse engineering expert \
analyzing multiple database implementations of the same business domain to extract DEEP INSIGHTS for \
understanding data models, business logic, and integration opportunities.";

const COMMON_PATTERNS_TEMPLATE: &str = r#"{
  "reverse_engineering_insights": {
    "domain_analysis": {
      "confirmed_business_domain": "e-commerce",
      "domain_confidence": 98,
      "sub_domains_identified": ["customer_management", "order_processing", "product_catalog"],
      "business_processes_mapped": ["Customer registration and profile management", "Order placement and payment processing"],
      "industry_patterns": ["Standard e-commerce workflow", "Multi-tenant architecture"],
      "common_patterns": ["Customer-Order one-to-many relationship in every source"]
    },
    "cross_platform_entity_mapping": {
      "customer_entity_variations": [
        {
          "platform": "database1",
          "table_name": "customers",
          "key_fields": ["customer_id", "email", "first_name", "last_name"],
          "unique_features": ["shop_id for multi-tenancy"],
          "business_logic": "Customer data tied to specific shop instances"
        }
      ]
    },
    "architectural_pattern_comparison": {
      "key_differences": ["database1 uses a normalized relational model while database2 uses EAV"],
      "design_philosophies": {
        "database1": {
          "approach": "Multi-tenant SaaS architecture",
          "strengths": ["Scalable multi-tenancy"],
          "weaknesses": ["Complexity in data isolation"],
          "use_case_fit": "SaaS platforms"
        }
      },
      "scalability_analysis": {
        "horizontal_scaling": {"database1": "Excellent - designed for multi-tenancy"},
        "vertical_scaling": {"database1": "Good - optimized for cloud deployment"}
      }
    },
    "data_integration_blueprint": {
      "unified_data_model": {
        "customer_unified_schema": {
          "standard_fields": ["id", "email", "first_name", "last_name", "created_at"],
          "platform_specific_mappings": {"database1": {"shop_id": "tenant_id"}}
        }
      },
      "integration_strategies": {
        "api_gateway_approach": {
          "description": "Unified API layer over multiple databases",
          "benefits": ["Single interface", "Platform abstraction"],
          "complexity": "High"
        }
      }
    },
    "business_logic_extraction": {
      "common_business_rules": ["Customer email addresses must be unique within the system"],
      "platform_specific_rules": {"database1": ["Shop-specific customer isolation"]},
      "workflow_patterns": {"order_processing": "Order Creation -> Payment Processing -> Fulfillment -> Delivery"}
    },
    "performance_optimization_insights": {
      "common_bottlenecks": ["Unindexed foreign key relationships"],
      "scaling_recommendations": {
        "immediate": ["Add missing indexes"],
        "medium_term": ["Database partitioning"],
        "long_term": ["Event-driven data flow"]
      }
    },
    "security_and_compliance": {
      "data_protection": {
        "pii_handling": "Email addresses and customer data need encryption",
        "access_control": "Role-based access control for multi-tenant systems",
        "audit_trail": "Comprehensive logging for compliance requirements"
      }
    },
    "migration_roadmap": {
      "complexity_assessment": "Medium to High - significant architectural differences",
      "migration_phases": [
        {"phase": "Data Mapping and Validation", "duration": "2-3 weeks", "activities": ["Schema mapping"]}
      ],
      "risk_mitigation": ["Parallel system operation during transition"]
    }
  }
}"#;

const COMMON_PATTERNS_CLOSING: &str = "Focus on providing DEEP INSIGHTS that would help engineers understand \
the data models, business logic, and integration opportunities across all platforms. Be specific about \
architectural differences, data mapping strategies, and implementation recommendations.";

const ENTITY_MAPPING_TEMPLATE: &str = r#"{
  "entity_mappings": [
    {
      "business_concept": "Customer",
      "implementations": {
        "database1": {"table": "customers", "key_fields": ["customer_id", "email"]},
        "database2": {"table": "users", "key_fields": ["user_id", "email_address"]}
      },
      "common_attributes": ["email", "name", "created_date"],
      "unique_attributes": {
        "database1": ["loyalty_points"],
        "database2": ["last_login"]
      },
      "standardization_recommendation": "Use 'customer' as standard entity name with 'customer_id' and 'email' as key fields"
    }
  ],
  "field_mappings": [
    {
      "concept": "Email Address",
      "variations": ["email", "email_address", "user_email"],
      "recommended_standard": "email",
      "data_type_variations": ["VARCHAR(255)", "TEXT"],
      "recommended_type": "VARCHAR(255)"
    }
  ]
}"#;

const ARCHITECTURE_TEMPLATE: &str = r#"{
  "architectural_patterns": {
    "normalization_approaches": {
      "traditional_relational": ["databases using 3NF approach"],
      "eav_model": ["databases using Entity-Attribute-Value"],
      "document_oriented": ["databases with document/JSON storage"],
      "hybrid_approaches": ["databases mixing multiple patterns"]
    },
    "scalability_strategies": {
      "horizontal_scaling_ready": ["databases designed for sharding"],
      "vertical_scaling_optimized": ["databases optimized for single server"],
      "cache_friendly": ["databases with denormalized structures for caching"]
    },
    "flexibility_vs_structure": {
      "highly_structured": ["rigid schema databases"],
      "flexible_schema": ["databases allowing schema evolution"],
      "meta_driven": ["databases using metadata tables"]
    }
  },
  "design_philosophy": {
    "data_integrity_focus": "Which databases prioritize referential integrity",
    "performance_focus": "Which databases prioritize query performance",
    "flexibility_focus": "Which databases prioritize schema flexibility",
    "simplicity_focus": "Which databases prioritize simplicity"
  },
  "evolution_readiness": {
    "easy_to_modify": ["databases that can evolve easily"],
    "migration_friendly": ["databases with good migration paths"],
    "backward_compatible": ["databases maintaining compatibility"]
  }
}"#;

const INTEGRATION_TEMPLATE: &str = r#"{
  "integration_approaches": [
    {
      "approach": "API Gateway Pattern",
      "description": "Unified API layer over multiple databases",
      "best_for": ["real-time integration", "maintaining database independence"],
      "complexity": "medium",
      "implementation_steps": ["step1", "step2", "step3"]
    }
  ],
  "migration_paths": [
    {
      "from": "database1",
      "to": "database2",
      "complexity": "medium",
      "estimated_effort": "4-6 weeks",
      "key_challenges": ["schema transformation", "data validation"],
      "migration_strategy": "ETL with validation checkpoints",
      "rollback_plan": "maintain parallel systems during transition"
    }
  ],
  "data_synchronization": {
    "real_time_sync": {
      "recommended_tools": ["Apache Kafka", "AWS DMS"],
      "sync_patterns": ["event-driven", "CDC (Change Data Capture)"],
      "conflict_resolution": "last-write-wins with business rule exceptions"
    },
    "batch_sync": {
      "recommended_schedule": "nightly for non-critical data",
      "validation_strategy": "checksums and row counts",
      "error_handling": "quarantine and manual review"
    }
  },
  "unified_schema_design": {
    "recommended_entities": ["Customer", "Product", "Order", "Transaction"],
    "common_fields": {
      "Customer": ["id", "email", "name", "created_at", "updated_at"]
    },
    "extensibility_strategy": "JSON fields for platform-specific attributes"
  }
}"#;

const PERFORMANCE_TEMPLATE: &str = r#"{
  "indexing_strategies": {
    "well_indexed": ["databases with comprehensive indexing"],
    "under_indexed": ["databases missing critical indexes"],
    "over_indexed": ["databases with potentially excessive indexes"],
    "best_practices": ["common indexing patterns across implementations"]
  },
  "query_optimization": {
    "optimized_for_reads": ["databases optimized for SELECT operations"],
    "optimized_for_writes": ["databases optimized for INSERT/UPDATE"],
    "balanced_approach": ["databases with balanced read/write optimization"],
    "potential_bottlenecks": ["identified performance bottlenecks"]
  },
  "scalability_comparison": {
    "horizontal_scaling": {
      "ready": ["databases ready for horizontal scaling"],
      "needs_work": ["databases requiring changes for scaling"],
      "challenges": ["specific challenges for each database"]
    },
    "vertical_scaling": {
      "efficient": ["databases efficient on single server"],
      "resource_intensive": ["databases requiring significant resources"]
    }
  },
  "caching_opportunities": {
    "cache_friendly_queries": ["common query patterns suitable for caching"],
    "cache_invalidation_strategies": ["recommended cache invalidation approaches"],
    "materialized_views": ["opportunities for materialized views"]
  },
  "performance_recommendations": {
    "immediate_wins": ["quick performance improvements"],
    "long_term_optimizations": ["strategic performance improvements"],
    "monitoring_metrics": ["key metrics to monitor"]
  }
}"#;

const GOVERNANCE_TEMPLATE: &str = r#"{
  "security_patterns": {
    "pii_handling": {
      "well_protected": ["databases with good PII protection"],
      "needs_improvement": ["databases with PII concerns"],
      "encryption_status": ["encryption implementation across databases"],
      "access_control": ["access control patterns"]
    },
    "audit_trails": {
      "comprehensive_logging": ["databases with good audit trails"],
      "minimal_logging": ["databases with limited audit capabilities"],
      "compliance_ready": ["databases ready for compliance audits"]
    }
  },
  "data_quality": {
    "validation_rules": ["data validation patterns across databases"],
    "consistency_checks": ["data consistency mechanisms"],
    "data_cleansing": ["data quality maintenance approaches"]
  },
  "compliance_readiness": {
    "gdpr_compliance": {
      "ready": ["GDPR-ready databases"],
      "needs_work": ["databases requiring GDPR improvements"],
      "right_to_erasure": ["implementation of data deletion"]
    },
    "industry_standards": ["compliance with industry-specific standards"],
    "data_retention": ["data retention policies and implementation"]
  },
  "governance_recommendations": {
    "standardization_opportunities": ["areas for governance standardization"],
    "policy_enforcement": ["recommended policy enforcement mechanisms"],
    "monitoring_and_reporting": ["governance monitoring recommendations"]
  }
}"#;
