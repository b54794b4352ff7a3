//! Subject and topic taxonomy — the allowed-label sets for classification.
//!
//! This is configuration data, not pipeline logic: the pipeline only ever
//! asks "which subjects exist for this section" and "which topics exist for
//! this subject". The built-in [`Taxonomy::gate`] set covers the GATE
//! Electrical Engineering syllabus plus the General Aptitude section;
//! callers with a different syllabus construct their own `Taxonomy`.

use crate::types::Section;

/// One topic inside a subject, with the scope text shown to the classifier.
#[derive(Debug, Clone)]
pub struct TopicDef {
    pub name: String,
    pub scope: String,
}

impl TopicDef {
    pub fn new(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }
}

/// One subject and its topics.
#[derive(Debug, Clone)]
pub struct SubjectDef {
    pub name: String,
    pub topics: Vec<TopicDef>,
}

/// Allowed subjects per section, with per-subject topic lists.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    ee: Vec<SubjectDef>,
    ga: Vec<SubjectDef>,
}

impl Taxonomy {
    /// Build a taxonomy from explicit subject lists.
    pub fn new(ee: Vec<SubjectDef>, ga: Vec<SubjectDef>) -> Self {
        Self { ee, ga }
    }

    /// Subject names for a section — the allowed-label set for the
    /// subject-classification stage.
    pub fn subject_names(&self, section: Section) -> Vec<String> {
        self.section(section)
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Topics of a subject — the allowed-label set for the
    /// topic-classification stage. `None` when the subject is not part of
    /// the section's list (e.g. a hand-edited database row).
    pub fn topics_for(&self, section: Section, subject: &str) -> Option<&[TopicDef]> {
        self.section(section)
            .iter()
            .find(|s| s.name == subject)
            .map(|s| s.topics.as_slice())
    }

    fn section(&self, section: Section) -> &[SubjectDef] {
        match section {
            Section::Ee => &self.ee,
            Section::Ga => &self.ga,
        }
    }

    /// The built-in GATE EE + GA taxonomy.
    pub fn gate() -> Self {
        fn subject(name: &str, topics: &[(&str, &str)]) -> SubjectDef {
            SubjectDef {
                name: name.to_string(),
                topics: topics
                    .iter()
                    .map(|(n, s)| TopicDef::new(*n, *s))
                    .collect(),
            }
        }

        let ee = vec![
            subject(
                "Engineering Mathematics",
                &[
                    ("Linear Algebra", "Matrix algebra, systems of linear equations, eigenvalues, eigenvectors."),
                    ("Calculus", "Mean value theorems, definite and improper integrals, partial derivatives, maxima and minima, multiple integrals, vector identities, line/surface/volume integrals, Stokes's, Gauss's and Green's theorems."),
                    ("Differential Equations", "First order equations, higher order linear equations with constant coefficients, variation of parameters, Cauchy's and Euler's equations, boundary value problems, separation of variables."),
                    ("Complex Variables", "Analytic functions, Cauchy's integral theorem and formula, Taylor and Laurent series, residue theorem."),
                    ("Probability and Statistics", "Sampling theorems, conditional probability, mean, median, mode, standard deviation, discrete and continuous distributions, correlation and regression analysis."),
                ],
            ),
            subject(
                "Electric circuits",
                &[
                    ("Network Elements", "Voltage and current sources, dependent sources, R, L, C, M elements."),
                    ("Network Theorems", "Thevenin, Norton, Superposition, and Maximum Power Transfer theorems."),
                    ("Transient Response", "Transient response of DC and AC networks."),
                    ("Sinusoidal Steady-State Analysis", "Sinusoidal steady-state analysis."),
                    ("Resonance", "Resonance in AC networks."),
                    ("Two Port Networks", "Analysis and applications of two port networks."),
                    ("Complex Power and Power Factor", "Complex power calculations and power factor in AC circuits."),
                ],
            ),
            subject(
                "Electromagnetic Fields",
                &[
                    ("Electric Field Intensity", "Electric field intensity for various charge distributions."),
                    ("Electric Flux Density", "Electric flux density and Gauss's law applications."),
                    ("Divergence", "Divergence in vector calculus for electric fields."),
                    ("Electric Potential", "Field and potential due to point, line, plane and spherical charge distributions."),
                    ("Capacitance", "Capacitance of simple configurations."),
                    ("Curl", "Curl in vector calculus for magnetic fields."),
                    ("Inductance", "Self and mutual inductance concepts."),
                    ("Magnetic Circuits", "Magnetomotive force, reluctance, and magnetic circuit analysis."),
                ],
            ),
            subject(
                "Signals and Systems",
                &[
                    ("Signal Properties", "Shifting and scaling properties of signals."),
                    ("LTI Systems", "Linear time-invariant and causal systems analysis."),
                    ("Fourier Series", "Fourier series representation of periodic signals."),
                    ("Sampling Theorem", "Nyquist-Shannon sampling theorem."),
                    ("Fourier Transform", "Applications of the Fourier transform in signal analysis."),
                    ("Laplace and Z Transforms", "Laplace transform and Z transform techniques."),
                    ("RMS and Average Values", "RMS and average value calculations for periodic waveforms."),
                ],
            ),
            subject(
                "Electrical Machines",
                &[
                    ("Transformers", "Single-phase equivalent circuit, open/short circuit tests, regulation and efficiency; auto-transformers; three-phase connections, vector groups, parallel operation."),
                    ("Electromechanical Conversion", "Electromechanical energy conversion principles."),
                    ("DC Machines", "Separately excited, series and shunt machines, characteristics, speed control, losses and efficiency."),
                    ("Three Phase Induction Machines", "Operating principle, torque-speed characteristics, equivalent circuit, speed control, efficiency."),
                    ("Single Phase Induction Motors", "Operating principles of single-phase induction motors."),
                    ("Synchronous Machines", "Cylindrical and salient pole machines, performance, regulation, starting methods, efficiency."),
                ],
            ),
            subject(
                "Power Systems",
                &[
                    ("Transmission Concepts", "AC and DC transmission models and performance; series and shunt compensation."),
                    ("Economic Load Dispatch", "Economic load dispatch with and without transmission losses; power generation concepts."),
                    ("Insulators and Distribution Systems", "Electric field distribution, insulator design, distribution system analysis."),
                    ("Load Flow Methods", "Gauss-Seidel and Newton-Raphson load flow methods."),
                    ("Voltage/Frequency Control", "Voltage and frequency regulation in power systems."),
                    ("Power Factor Correction", "Techniques for power factor improvement."),
                    ("Fault Analysis", "Symmetrical and unsymmetrical fault analysis; symmetrical components."),
                    ("Protection Systems", "Over-current, differential, directional and distance protection; circuit breakers."),
                    ("System Stability", "Stability concepts, equal area criterion, swing equation, critical clearing angle and time."),
                ],
            ),
            subject(
                "Control Systems",
                &[
                    ("Block Diagrams/Signal Flow", "Block diagrams and signal flow graphs."),
                    ("System Analysis", "Transient and steady-state analysis of LTI systems."),
                    ("Stability Criteria", "Routh-Hurwitz and Nyquist stability criteria."),
                    ("Frequency Response", "Bode plots and root locus analysis."),
                    ("Compensators and Controllers", "Lag, lead and lead-lag compensators; P, PI and PID controllers."),
                    ("State Space Analysis", "State space models and solution of state equations."),
                ],
            ),
            subject(
                "Electrical and Electronic Measurements",
                &[
                    ("Bridges/Potentiometers and Instrument tranformers", "Bridges and potentiometers for measurements; current and voltage transformers."),
                    ("Meters", "Measurement of voltage, current, power, energy and power factor."),
                    ("Phase/Time/Frequency Oscilloscopes", "Oscilloscope operation; phase, time and frequency measurement methods."),
                    ("Error Analysis", "Error analysis in measurements."),
                ],
            ),
            subject(
                "Analog Electronics",
                &[
                    ("Diode Circuits", "Clipping, clamping and rectifier circuits."),
                    ("Amplifiers", "Biasing, equivalent circuits and frequency response."),
                    ("Oscillators", "Feedback amplifiers and oscillator circuits; VCOs and timers."),
                    ("Op-Amps", "Operational amplifier characteristics and applications; active filters."),
                ],
            ),
            subject(
                "Digital Electronics",
                &[
                    ("Combinational Logic", "Combinational circuits, multiplexers and demultiplexers."),
                    ("Sequential Circuits", "Sequential logic circuits."),
                    ("AD/DA Converters", "A/D and D/A converters; Schmitt trigger circuits."),
                ],
            ),
            subject(
                "Power Electronics",
                &[
                    ("Power Semiconductor Devices", "Static V-I characteristics and firing circuits for thyristor, MOSFET, IGBT."),
                    ("DC-DC Converters", "Buck, boost and buck-boost converters."),
                    ("Rectifiers", "Single and three-phase uncontrolled rectifiers."),
                    ("Thyristor Converters", "Voltage and current commutated thyristor-based converters."),
                    ("AC-DC Converters", "Bidirectional AC to DC voltage source converters."),
                    ("Harmonics and Power Factor", "Harmonic analysis and distortion factor in converters."),
                    ("Inverters", "Single-phase and three-phase voltage/current source inverters."),
                    ("PWM Techniques", "Sinusoidal pulse width modulation."),
                ],
            ),
        ];

        let ga = vec![
            subject(
                "Verbal Aptitude",
                &[
                    ("English Grammar", "Basic grammar rules, parts of speech, sentence construction."),
                    ("Vocabulary", "Word meanings, synonyms, antonyms, analogies."),
                    ("Reading Comprehension", "Understanding passages, inference drawing, author's intent."),
                    ("Critical Reasoning", "Argument analysis, assumption identification, logical deduction."),
                ],
            ),
            subject(
                "Quantitative Aptitude",
                &[
                    ("Number Systems", "Integers, fractions, decimals, properties of numbers."),
                    ("Arithmetic", "Percentages, ratios, averages, profit and loss, time and work."),
                    ("Algebra", "Linear equations, quadratic equations, polynomials."),
                    ("Geometry", "Lines, angles, triangles, circles, coordinate geometry."),
                    ("Calculus", "Derivatives, integrals, applications."),
                ],
            ),
            subject(
                "Analytical Aptitude",
                &[
                    ("Data Interpretation", "Tables, charts, graphs, data analysis."),
                    ("Logical Reasoning", "Deductive and inductive reasoning, analogies, syllogisms."),
                    ("Pattern Recognition", "Numerical and visual pattern recognition."),
                ],
            ),
            subject(
                "Spatial Aptitude",
                &[
                    ("Spatial Visualization", "Mental rotation, spatial orientation."),
                    ("Spatial Reasoning", "Paper folding, pattern completion, block diagrams."),
                ],
            ),
        ];

        Self { ee, ga }
    }
}
