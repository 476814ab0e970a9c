//! Row-by-row materialization of the process, participant and quality chain.
//!
//! [`EntityBuilder::build`] folds every metadata row into a [`BuildState`]. A row either
//! contributes its full node chain or, when an identity field is missing, nothing at all.

use std::collections::{BTreeMap, BTreeSet};

use crate::classify::{Classifier, Productivity};
use crate::config::ResolvedConfig;
use crate::domain::{ProcessType, ProductClass};
use crate::graph::{Graph, Literal};
use crate::identity::NodeIds;
use crate::metadata::{MetadataRow, MetadataTable, column, parse_bool, parse_decimal};
use crate::report::{Tally, Warning};
use crate::vocab::{Namespaces, RDFS_LABEL, class, obo, prop};

pub const ANTIBODY_GENE_LABEL: &str = "antibody product gene";
pub const CONCENTRATION_UNIT: &str = "mM";

/// Everything accumulated while building one instance graph.
#[derive(Debug, Clone, Default)]
pub struct BuildState {
    pub graph: Graph,
    pub tally: Tally,
    /// Sample ids materialized so far; expression joins are scoped against these.
    pub samples: BTreeSet<String>,
    pub runs: BTreeMap<String, ProcessType>,
    /// Gene node IRIs.
    pub genes: BTreeSet<String>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty state that already knows the process types of `runs`, so a later row
    /// typing one of them differently is rejected.
    pub fn with_runs(runs: BTreeMap<String, ProcessType>) -> Self {
        Self {
            runs,
            ..Self::default()
        }
    }

    /// Folds another state into this one. The graphs are unioned.
    pub fn absorb(&mut self, other: BuildState) {
        self.graph.union_with(&other.graph);
        self.tally.absorb(other.tally);
        self.samples.extend(other.samples);
        self.runs.extend(other.runs);
        self.genes.extend(other.genes);
    }

    /// Gene node for `symbol`, created on first use.
    pub fn gene(&mut self, ids: NodeIds<'_>, symbol: &str) -> String {
        let gene = ids.gene(symbol);
        if self.genes.insert(gene.clone()) {
            let ns = ids.namespaces();
            self.graph.add_type(&gene, &ns.mcbo(class::GENE));
            self.graph.add(&gene, RDFS_LABEL, Literal::string(symbol));
        }
        gene
    }

    /// The single placeholder gene shared by every antibody-producing cell line.
    pub fn antibody_gene(&mut self, ids: NodeIds<'_>) -> String {
        let gene = ids.antibody_gene();
        if self.genes.insert(gene.clone()) {
            let ns = ids.namespaces();
            self.graph.add_type(&gene, &ns.mcbo(class::GENE));
            self.graph
                .add(&gene, RDFS_LABEL, Literal::string(ANTIBODY_GENE_LABEL));
        }
        gene
    }

    /// Expression measurement of `symbol` in `sample_id`, linked from the sample.
    pub fn measurement(
        &mut self,
        ids: NodeIds<'_>,
        sample_id: &str,
        symbol: &str,
        value: Option<f64>,
    ) -> String {
        let ns = ids.namespaces();
        let gene = self.gene(ids, symbol);
        let sample = ids.sample(sample_id);
        let measurement = ids.expression(sample_id, symbol);
        if self
            .graph
            .add_type(&measurement, &ns.mcbo(class::GENE_EXPRESSION_MEASUREMENT))
        {
            self.tally.measurements += 1;
        }
        self.graph
            .add_link(&measurement, &ns.obo(obo::IS_ABOUT), &gene);
        if let Some(value) = value {
            self.graph.add(
                &measurement,
                &ns.mcbo(prop::HAS_EXPRESSION_VALUE),
                Literal::decimal(value),
            );
        }
        self.graph
            .add_link(&sample, &ns.mcbo(prop::HAS_GENE_EXPRESSION), &measurement);
        measurement
    }
}

/// Identity fields every row must carry.
struct RowIdentity<'r> {
    run: &'r str,
    sample: &'r str,
    cell_line: &'r str,
    process_type: ProcessType,
}

/// IRIs minted for one accepted row.
struct RowNodes {
    run: String,
    system: String,
    sample: String,
    cell_line: String,
    medium: Option<String>,
}

pub struct EntityBuilder<'a> {
    ns: &'a Namespaces,
    ids: NodeIds<'a>,
    classifier: Classifier,
}

impl<'a> EntityBuilder<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self {
            ns: &config.namespaces,
            ids: NodeIds::new(&config.namespaces),
            classifier: Classifier::new(config),
        }
    }

    pub fn build(&self, table: &MetadataTable, state: BuildState) -> BuildState {
        self.build_with_guard(table, &BTreeSet::new(), state)
    }

    /// Like [`build`](Self::build), but rows whose run id is in `known_runs` are skipped.
    pub fn build_with_guard(
        &self,
        table: &MetadataTable,
        known_runs: &BTreeSet<String>,
        state: BuildState,
    ) -> BuildState {
        let state = table.rejected.iter().fold(state, |mut state, rejected| {
            state.tally.rows_seen += 1;
            state.tally.skip_row(Warning::RowValidation {
                line: rejected.line,
                reason: rejected.message.clone(),
            });
            state
        });
        table
            .rows
            .iter()
            .fold(state, |state, row| self.apply_row(state, row, known_runs))
    }

    pub fn apply_row(
        &self,
        mut state: BuildState,
        row: &MetadataRow,
        known_runs: &BTreeSet<String>,
    ) -> BuildState {
        state.tally.rows_seen += 1;
        let line = row.line();

        let identity = match self.identity(row) {
            Ok(identity) => identity,
            Err(reason) => {
                state.tally.skip_row(Warning::RowValidation { line, reason });
                return state;
            }
        };

        if known_runs.contains(identity.run) {
            state.tally.skip_row(Warning::AlreadyIndexed {
                line,
                run: identity.run.to_string(),
            });
            return state;
        }

        if let Some(previous) = state.runs.get(identity.run)
            && *previous != identity.process_type
        {
            let reason = format!(
                "run {} already typed {previous}, row says {}",
                identity.run, identity.process_type
            );
            state.tally.skip_row(Warning::RowValidation { line, reason });
            return state;
        }

        state
            .runs
            .insert(identity.run.to_string(), identity.process_type);
        state.samples.insert(identity.sample.to_string());
        *state
            .tally
            .process_types
            .entry(identity.process_type)
            .or_default() += 1;
        state.tally.rows_processed += 1;

        let nodes = self.chain(&mut state, &identity, row);
        self.condition_quality(&mut state, &identity, &nodes, row);
        self.culture_phase(&mut state, &identity, &nodes, row);
        self.productivity(&mut state, &identity, &nodes, row);
        self.sample_measurements(&mut state, &identity, &nodes, row);
        self.clone_line(&mut state, &nodes, row);
        self.inline_expression(&mut state, &identity, row);
        self.product(&mut state, &identity, &nodes, row);
        self.glutamine(&mut state, &identity, &nodes, row);
        self.engineering(&mut state, &nodes, row);
        state
    }

    fn identity<'r>(&self, row: &'r MetadataRow) -> Result<RowIdentity<'r>, String> {
        let run = row.get(column::RUN_ACCESSION);
        let sample = row.get(column::SAMPLE_ACCESSION);
        let cell_line = row.get(column::CELL_LINE);
        let process_type = row.get(column::PROCESS_TYPE);
        match (run, sample, cell_line, process_type) {
            (Some(run), Some(sample), Some(cell_line), Some(process_type)) => Ok(RowIdentity {
                run,
                sample,
                cell_line,
                process_type: self.classifier.process_type(process_type),
            }),
            _ => {
                let missing = [
                    (column::RUN_ACCESSION, run),
                    (column::SAMPLE_ACCESSION, sample),
                    (column::CELL_LINE, cell_line),
                    (column::PROCESS_TYPE, process_type),
                ]
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect::<Vec<_>>();
                Err(format!("missing {}", missing.join(", ")))
            }
        }
    }

    fn mcbo(&self, local: &str) -> String {
        self.ns.mcbo(local)
    }

    /// Run, culture system, sample, cell line and medium.
    fn chain(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        row: &MetadataRow,
    ) -> RowNodes {
        let graph = &mut state.graph;
        let run = self.ids.run(identity.run);
        graph.add_type(&run, &self.mcbo(identity.process_type.class_name()));

        let system = self.ids.system(identity.run);
        graph.add_type(&system, &self.mcbo(class::CELL_CULTURE_SYSTEM));
        graph.add_link(&run, &self.ns.obo(obo::HAS_PARTICIPANT), &system);

        let sample = self.ids.sample(identity.sample);
        graph.add_type(&sample, &self.mcbo(class::BIOPROCESS_SAMPLE));
        graph.add_link(&run, &self.mcbo(prop::HAS_PROCESS_OUTPUT), &sample);

        let cell_line = self.ids.cell_line(identity.cell_line);
        graph.add_type(&cell_line, &self.mcbo(class::CELL_LINE));
        if let Some(subclass) = self.classifier.cell_line_class(identity.cell_line) {
            graph.add_type(&cell_line, &self.mcbo(subclass));
        }
        graph.add(&cell_line, RDFS_LABEL, Literal::string(identity.cell_line));
        graph.add_link(&run, &self.mcbo(prop::USES_CELL_LINE), &cell_line);
        graph.add_link(&system, &self.ns.obo(obo::HAS_PART), &cell_line);

        let medium = row.first_of(column::MEDIUM).map(|name| {
            let medium = self.ids.medium(name);
            graph.add_type(&medium, &self.mcbo(class::CULTURE_MEDIUM));
            graph.add(&medium, RDFS_LABEL, Literal::string(name));
            graph.add_link(&system, &self.ns.obo(obo::HAS_PART), &medium);
            medium
        });

        RowNodes {
            run,
            system,
            sample,
            cell_line,
            medium,
        }
    }

    fn condition_quality(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        nodes: &RowNodes,
        row: &MetadataRow,
    ) {
        let quality = self.ids.condition_quality(identity.run);
        state
            .graph
            .add_type(&quality, &self.mcbo(class::CULTURE_CONDITION_QUALITY));
        state
            .graph
            .add_link(&nodes.system, &self.ns.obo(obo::HAS_QUALITY), &quality);

        let fields = [
            (column::TEMPERATURE, row.get(column::TEMPERATURE), prop::HAS_TEMPERATURE),
            (column::PH[0], row.first_of(column::PH), prop::HAS_PH),
            (
                column::DISSOLVED_OXYGEN[0],
                row.first_of(column::DISSOLVED_OXYGEN),
                prop::HAS_DISSOLVED_OXYGEN,
            ),
        ];
        for (field, raw, property) in fields {
            if let Some(value) = raw.and_then(|raw| numeric(&mut state.tally, row, field, raw)) {
                state
                    .graph
                    .add(&quality, &self.mcbo(property), Literal::decimal(value));
            }
        }
    }

    fn culture_phase(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        nodes: &RowNodes,
        row: &MetadataRow,
    ) {
        let Some(raw) = row.get(column::CULTURE_PHASE) else {
            return;
        };
        let phase = self.ids.phase(identity.run);
        let kind = self.classifier.culture_phase(raw);
        state.graph.add_type(&phase, &self.mcbo(kind.class_name()));
        state
            .graph
            .add_link(&nodes.sample, &self.mcbo(prop::IN_CULTURE_PHASE), &phase);
    }

    fn productivity(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        nodes: &RowNodes,
        row: &MetadataRow,
    ) {
        let Some(raw) = row.get(column::PRODUCTIVITY) else {
            return;
        };
        let (tier, value) = match self.classifier.productivity(raw) {
            Productivity::Category(tier) => (tier, None),
            Productivity::Measured { tier, value } => (tier, Some(value)),
            Productivity::Unrecognized => {
                state.tally.warn(field_warning(row, column::PRODUCTIVITY, raw));
                return;
            }
        };
        let node = self.ids.productivity(identity.run);
        let graph = &mut state.graph;
        graph.add_type(&node, &self.mcbo(tier.class_name()));
        graph.add(
            &node,
            &self.mcbo(prop::HAS_PRODUCTIVITY_CATEGORY),
            Literal::string(tier.to_string()),
        );
        if let Some(value) = value {
            graph.add(
                &node,
                &self.mcbo(prop::HAS_PRODUCTIVITY_VALUE),
                Literal::decimal(value),
            );
        }
        graph.add_link(
            &nodes.run,
            &self.mcbo(prop::HAS_PRODUCTIVITY_MEASUREMENT),
            &node,
        );
    }

    /// Collection day and the viability measurement of the sample.
    fn sample_measurements(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        nodes: &RowNodes,
        row: &MetadataRow,
    ) {
        if let Some(raw) = row.get(column::COLLECTION_DAY) {
            match parse_decimal(raw).filter(|day| day.fract() == 0.0) {
                Some(day) => {
                    state.graph.add(
                        &nodes.sample,
                        &self.mcbo(prop::HAS_COLLECTION_DAY),
                        Literal::integer(day as i64),
                    );
                }
                None => state
                    .tally
                    .warn(field_warning(row, column::COLLECTION_DAY, raw)),
            }
        }

        let density = row.get(column::VIABLE_CELL_DENSITY);
        let percentage = row.get(column::VIABILITY_PERCENTAGE);
        if density.is_none() && percentage.is_none() {
            return;
        }
        let viability = self.ids.viability(identity.sample);
        state
            .graph
            .add_type(&viability, &self.mcbo(class::CELL_VIABILITY_MEASUREMENT));
        state.graph.add_link(
            &nodes.sample,
            &self.mcbo(prop::HAS_CELL_VIABILITY_MEASUREMENT),
            &viability,
        );
        let fields = [
            (column::VIABLE_CELL_DENSITY, density, prop::HAS_VIABLE_CELL_DENSITY),
            (column::VIABILITY_PERCENTAGE, percentage, prop::HAS_VIABILITY_PERCENTAGE),
        ];
        for (field, raw, property) in fields {
            if let Some(value) = raw.and_then(|raw| numeric(&mut state.tally, row, field, raw)) {
                state
                    .graph
                    .add(&viability, &self.mcbo(property), Literal::decimal(value));
            }
        }
    }

    fn clone_line(&self, state: &mut BuildState, nodes: &RowNodes, row: &MetadataRow) {
        let Some(clone_id) = row.get(column::CLONE_ID) else {
            return;
        };
        let clone = self.ids.clone_line(clone_id);
        let graph = &mut state.graph;
        graph.add_type(&clone, &self.mcbo(class::CLONE));
        graph.add(&clone, RDFS_LABEL, Literal::string(clone_id));
        graph.add_link(&nodes.cell_line, &self.mcbo(prop::HAS_CLONE), &clone);
        graph.add_link(&nodes.run, &self.mcbo(prop::USES_CELL_LINE), &clone);
    }

    /// Measurements listed directly in the metadata row.
    fn inline_expression(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        row: &MetadataRow,
    ) {
        let Some(raw) = row.get(column::GENE_SYMBOL) else {
            return;
        };
        let symbols = raw
            .split([';', ','])
            .map(str::trim)
            .filter(|symbol| !symbol.is_empty())
            .collect::<Vec<_>>();
        let value = row
            .get(column::EXPRESSION_VALUE)
            .and_then(|raw| numeric(&mut state.tally, row, column::EXPRESSION_VALUE, raw));

        for symbol in &symbols {
            state.measurement(self.ids, identity.sample, symbol, value);
        }

        if let ([symbol], Some(ensembl)) = (symbols.as_slice(), row.get(column::ENSEMBL_GENE_ID)) {
            let gene = self.ids.gene(symbol);
            state.graph.add(
                &gene,
                &self.mcbo(prop::HAS_ENSEMBL_GENE_ID),
                Literal::string(ensembl),
            );
        }
    }

    /// Therapeutic product of the run with titer and quality attributes.
    fn product(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        nodes: &RowNodes,
        row: &MetadataRow,
    ) {
        let titer = row.get(column::TITER_VALUE);
        let quality_type = row.get(column::QUALITY_TYPE);
        if titer.is_none() && quality_type.is_none() {
            return;
        }

        let product = self.ids.product(identity.run);
        state
            .graph
            .add_type(&product, &self.mcbo(class::THERAPEUTIC_PROTEIN));
        state
            .graph
            .add_link(&nodes.run, &self.mcbo(prop::HAS_PRODUCT), &product);

        if let Some(value) =
            titer.and_then(|raw| numeric(&mut state.tally, row, column::TITER_VALUE, raw))
        {
            state.graph.add(
                &product,
                &self.mcbo(prop::HAS_TITER_VALUE),
                Literal::decimal(value),
            );
        }

        if titer.is_some()
            && let Some(product_type) = row.get(column::PRODUCT_TYPE)
            && self.classifier.product_type(product_type) != ProductClass::Control
        {
            state
                .graph
                .add(&product, RDFS_LABEL, Literal::string(product_type));
        }

        if let Some(quality_type) = quality_type {
            let quality = self.ids.quality(identity.run, quality_type);
            let graph = &mut state.graph;
            graph.add_type(&quality, &self.mcbo(class::QUALITY_MEASUREMENT));
            graph.add(&quality, RDFS_LABEL, Literal::string(quality_type));
            graph.add_link(&product, &self.mcbo(prop::HAS_QUALITY_MEASUREMENT), &quality);
        }
    }

    fn glutamine(
        &self,
        state: &mut BuildState,
        identity: &RowIdentity<'_>,
        nodes: &RowNodes,
        row: &MetadataRow,
    ) {
        let Some(raw) = row.get(column::GLUTAMINE_CONCENTRATION) else {
            return;
        };
        let value = numeric(&mut state.tally, row, column::GLUTAMINE_CONCENTRATION, raw);

        let nutrient = self.ids.glutamine(identity.run);
        let graph = &mut state.graph;
        graph.add_type(&nutrient, &self.mcbo(class::GLUTAMINE_CONCENTRATION));
        graph.add_type(&nutrient, &self.mcbo(class::NUTRIENT_CONCENTRATION));
        graph.add(&nutrient, RDFS_LABEL, Literal::string(format!("Glutamine {raw}mM")));
        if let Some(value) = value {
            graph.add(
                &nutrient,
                &self.mcbo(prop::HAS_CONCENTRATION_VALUE),
                Literal::decimal(value),
            );
            graph.add(
                &nutrient,
                &self.mcbo(prop::HAS_CONCENTRATION_UNIT),
                Literal::string(CONCENTRATION_UNIT),
            );
        }

        let medium = match &nodes.medium {
            Some(medium) => medium.clone(),
            None => {
                let medium = self.ids.medium(identity.run);
                graph.add_type(&medium, &self.mcbo(class::CULTURE_MEDIUM));
                graph.add(&medium, RDFS_LABEL, Literal::string("Culture Medium"));
                graph.add_link(&nodes.system, &self.ns.obo(obo::HAS_PART), &medium);
                medium
            }
        };
        graph.add_link(
            &medium,
            &self.mcbo(prop::HAS_NUTRIENT_CONCENTRATION),
            &nutrient,
        );
    }

    /// Genes the cell line overexpresses, from explicit columns or inferred from the
    /// product it was engineered to make.
    fn engineering(&self, state: &mut BuildState, nodes: &RowNodes, row: &MetadataRow) {
        let product_type = row.get(column::PRODUCT_TYPE);
        let explicit = row
            .first_of(column::OVEREXPRESSED_GENE)
            .map(split_gene_list)
            .unwrap_or_default();

        let genes = if !explicit.is_empty() {
            explicit
                .iter()
                .map(|symbol| state.gene(self.ids, symbol))
                .collect::<Vec<_>>()
        } else {
            self.inferred_gene(state, row, product_type)
                .into_iter()
                .collect()
        };

        for gene in &genes {
            state
                .graph
                .add_link(&nodes.cell_line, &self.mcbo(prop::OVEREXPRESSES_GENE), gene);
            if let Some(product_type) = product_type {
                state.graph.add(
                    &nodes.cell_line,
                    &self.mcbo(prop::PRODUCES_PRODUCT),
                    Literal::string(product_type),
                );
            }
        }
    }

    fn inferred_gene(
        &self,
        state: &mut BuildState,
        row: &MetadataRow,
        product_type: Option<&str>,
    ) -> Option<String> {
        let raw = row.get(column::PRODUCER)?;
        match parse_bool(raw) {
            Some(true) => {}
            Some(false) => return None,
            None => {
                state.tally.warn(field_warning(row, column::PRODUCER, raw));
                return None;
            }
        }
        let product_type = product_type?;
        match self.classifier.product_type(product_type) {
            ProductClass::Gene(symbol) => Some(state.gene(self.ids, &symbol)),
            ProductClass::Antibody => Some(state.antibody_gene(self.ids)),
            ProductClass::Control => None,
            ProductClass::Unknown => {
                state.tally.warn(Warning::AmbiguousClassification {
                    line: row.line(),
                    value: product_type.to_string(),
                });
                None
            }
        }
    }
}

fn split_gene_list(raw: &str) -> Vec<&str> {
    raw.split(|ch: char| matches!(ch, ';' | ',' | '|' | '/') || ch.is_whitespace())
        .filter(|symbol| !symbol.is_empty())
        .collect()
}

fn numeric(tally: &mut Tally, row: &MetadataRow, field: &str, raw: &str) -> Option<f64> {
    let parsed = parse_decimal(raw);
    if parsed.is_none() {
        tally.warn(field_warning(row, field, raw));
    }
    parsed
}

fn field_warning(row: &MetadataRow, field: &str, raw: &str) -> Warning {
    Warning::FieldParse {
        line: row.line(),
        field: field.to_string(),
        value: raw.to_string(),
    }
}
